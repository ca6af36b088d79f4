//! Resolves an ad's stable identifier by opening its disclosure menu and
//! reading the "why am I seeing this" entry.
//!
//! The host renders the menu whenever it likes, so resolution is a small
//! state machine advanced by ticks: open the menu, poll until the entry
//! shows up, then close the menu again. Every click happens under a
//! [`FocusGuard`] so the user's focus and selection survive.

use crate::error::ExtractError;
use crate::focus::FocusGuard;
use crate::host::HostDocument;
use crate::model::Identifier;
use tracing::debug;
use url::Url;

const TIMELINE_ENTRY_ATTRIBUTE: &str = "data-feed-option-name";
const TIMELINE_ENTRY_VALUE: &str = "FeedAdSeenReasonOption";
const SIDEBAR_ENTRY_LABEL: &str = "Why am I seeing this?";
const ACTION_BASE: &str = "https://facebook.com";

/// Finds the open menu and the disclosure entry inside it.
pub trait MenuFinder<H: HostDocument> {
    fn locate_menu(&self, host: &H) -> Option<H::Node>;
    fn select_entry(&self, host: &H, menu: &H::Node) -> Option<H::Node>;
}

/// Timeline menus render as a separate layer owned by the toggle.
#[derive(Debug, Clone)]
pub struct TimelineMenu {
    owner_id: String,
}

impl<H: HostDocument> MenuFinder<H> for TimelineMenu {
    fn locate_menu(&self, host: &H) -> Option<H::Node> {
        host.elements_by_class("uiLayer").into_iter().find(|layer| {
            host.attribute(layer, "data-ownerid").as_deref() == Some(self.owner_id.as_str())
        })
    }

    fn select_entry(&self, host: &H, menu: &H::Node) -> Option<H::Node> {
        host.find_descendant(menu, |host, item| {
            host.tag_name(item) == "li"
                && host.attribute(item, TIMELINE_ENTRY_ATTRIBUTE).as_deref()
                    == Some(TIMELINE_ENTRY_VALUE)
        })
    }
}

/// Sidebar menus populate inside the selector control itself.
#[derive(Debug, Clone)]
pub struct SidebarMenu<N> {
    control: N,
}

impl<H: HostDocument> MenuFinder<H> for SidebarMenu<H::Node> {
    fn locate_menu(&self, _host: &H) -> Option<H::Node> {
        Some(self.control.clone())
    }

    fn select_entry(&self, host: &H, menu: &H::Node) -> Option<H::Node> {
        host.find_descendant(menu, |host, item| {
            host.tag_name(item) == "li"
                && host.attribute(item, "data-label").as_deref() == Some(SIDEBAR_ENTRY_LABEL)
        })
    }
}

#[derive(Debug, Clone)]
pub enum MenuStrategy<N> {
    Timeline(TimelineMenu),
    Sidebar(SidebarMenu<N>),
}

impl<H: HostDocument> MenuFinder<H> for MenuStrategy<H::Node> {
    fn locate_menu(&self, host: &H) -> Option<H::Node> {
        match self {
            MenuStrategy::Timeline(finder) => finder.locate_menu(host),
            MenuStrategy::Sidebar(finder) => finder.locate_menu(host),
        }
    }

    fn select_entry(&self, host: &H, menu: &H::Node) -> Option<H::Node> {
        match self {
            MenuStrategy::Timeline(finder) => finder.select_entry(host, menu),
            MenuStrategy::Sidebar(finder) => finder.select_entry(host, menu),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub id: Identifier,
    /// Action target of the disclosure entry, relative to the host origin.
    pub disclosure_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverState {
    Locate,
    PollMenu,
    Done,
    Error(ExtractError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverProgress {
    Pending,
    Resolved(Resolution),
    Failed(ExtractError),
}

#[derive(Debug)]
pub struct IdentityResolver<N> {
    toggle: N,
    strategy: MenuStrategy<N>,
    state: ResolverState,
}

impl<N: Clone> IdentityResolver<N> {
    pub fn timeline(toggle: N, owner_id: &Identifier) -> Self {
        Self::new(
            toggle,
            MenuStrategy::Timeline(TimelineMenu {
                owner_id: owner_id.as_str().to_string(),
            }),
        )
    }

    pub fn sidebar(toggle: N, control: N) -> Self {
        Self::new(toggle, MenuStrategy::Sidebar(SidebarMenu { control }))
    }

    fn new(toggle: N, strategy: MenuStrategy<N>) -> Self {
        Self {
            toggle,
            strategy,
            state: ResolverState::Locate,
        }
    }

    pub fn state(&self) -> &ResolverState {
        &self.state
    }

    pub fn tick<H>(&mut self, host: &mut H) -> ResolverProgress
    where
        H: HostDocument<Node = N>,
    {
        match self.state.clone() {
            ResolverState::Locate => {
                self.toggle_menu(host);
                self.state = ResolverState::PollMenu;
                ResolverProgress::Pending
            }
            ResolverState::PollMenu => self.poll(host),
            ResolverState::Done => ResolverProgress::Failed(ExtractError::Invariant),
            ResolverState::Error(error) => ResolverProgress::Failed(error),
        }
    }

    /// Gives up on resolution, closing the menu if this resolver opened it.
    pub fn abandon<H>(&mut self, host: &mut H, error: ExtractError)
    where
        H: HostDocument<Node = N>,
    {
        if self.state == ResolverState::PollMenu {
            debug!("Closing menu left open by an abandoned resolution");
            self.toggle_menu(host);
        }
        self.state = ResolverState::Error(error);
    }

    fn poll<H>(&mut self, host: &mut H) -> ResolverProgress
    where
        H: HostDocument<Node = N>,
    {
        // Any missing piece means the menu is still rendering.
        let Some(menu) = self.strategy.locate_menu(&*host) else {
            return ResolverProgress::Pending;
        };
        let Some(entry) = self.strategy.select_entry(&*host, &menu) else {
            return ResolverProgress::Pending;
        };
        let Some(anchor) = host.first_with_tag(&entry, "a") else {
            return ResolverProgress::Pending;
        };

        let action = host.attribute(&anchor, "ajaxify").unwrap_or_default();
        self.toggle_menu(host);

        match id_from_action(&action) {
            Some(id) => {
                debug!("Resolved ad id {} from {}", id, action);
                self.state = ResolverState::Done;
                ResolverProgress::Resolved(Resolution {
                    id,
                    disclosure_url: action,
                })
            }
            None => {
                self.state = ResolverState::Error(ExtractError::NoId);
                ResolverProgress::Failed(ExtractError::NoId)
            }
        }
    }

    fn toggle_menu<H>(&self, host: &mut H)
    where
        H: HostDocument<Node = N>,
    {
        let mut guard = FocusGuard::acquire(host);
        guard.click(&self.toggle);
    }
}

fn id_from_action(action: &str) -> Option<Identifier> {
    let url = Url::parse(&format!("{ACTION_BASE}{action}")).ok()?;
    url.query_pairs()
        .find(|(key, value)| key == "id" && !value.is_empty())
        .map(|(_, value)| Identifier::new(value.into_owned()))
}
