// Shared fixtures for the scanner integration tests

#![allow(dead_code)]

use adlens_scanner::DisclosureFetcher;
use adlens_scanner::error::{Result, ScanError};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const EXAMPLE_PANEL: &str = "Foo Bar wants to reach people who like their Page. This is because you are a woman between 25 and 34 years old who live in <b>United States</b>. This ad ran on Facebook.";

/// Wraps disclosure markup the way the host's dialog endpoint does.
pub fn payload(html: &str) -> String {
    let body = serde_json::json!({
        "jsmods": { "markup": [["m_0", { "__html": html }, 1]] }
    });
    format!("for (;;);{}", body)
}

pub fn action(ad_id: &str) -> String {
    format!("/ads/preferences/dialog/?id={ad_id}")
}

/// A sponsored timeline post with its menu layer.
pub fn timeline_ad(n: usize, ad_id: &str, top: f64) -> String {
    format!(
        r##"<div id="hyperfeed_story_{n}">
            <div id="post{n}" class="userContentWrapper" data-rect="0 {top} 500 300">
                <div class="clearfix">
                    <h5><span class="fwb"><a href="https://www.facebook.com/acme{n}/?ref=nf">Acme {n}</a></span></h5>
                    <a id="label{n}" href="#">Sponsored</a>
                </div>
                <div class="uiPopover"><a id="u_0_{n}" href="#">Options</a></div>
                <div class="userContent"><p>Offer number {n}</p></div>
            </div>
        </div>
        <div class="uiLayer" data-ownerid="u_0_{n}"><ul>
            <li data-feed-option-name="HideOption"><a ajaxify="/hide">Hide</a></li>
            <li data-feed-option-name="FeedAdSeenReasonOption"><a ajaxify="{action}">Why am I seeing this?</a></li>
        </ul></div>"##,
        action = action(ad_id)
    )
}

/// A sponsored timeline post whose menu never renders.
pub fn timeline_ad_without_menu(n: usize, top: f64) -> String {
    format!(
        r##"<div id="hyperfeed_story_{n}">
            <div id="post{n}" class="userContentWrapper" data-rect="0 {top} 500 300">
                <div class="clearfix"><a href="#">Sponsored</a></div>
                <div class="uiPopover"><a id="u_0_{n}" href="#">Options</a></div>
                <div class="userContent"><p>Offer number {n}</p></div>
            </div>
        </div>"##
    )
}

/// An ordinary friend post.
pub fn timeline_post(n: usize, top: f64) -> String {
    format!(
        r##"<div id="hyperfeed_story_{n}">
            <div id="post{n}" class="userContentWrapper" data-rect="0 {top} 500 300">
                <div class="clearfix"><a href="#">Jane Doe</a></div>
                <div class="userContent"><p>Lunch!</p></div>
            </div>
        </div>"##
    )
}

/// A sponsored sidebar unit whose menu lives inside its selector.
pub fn sidebar_ad(n: usize, ad_id: &str, top: f64) -> String {
    format!(
        r##"<div id="section{n}" class="ego_section">
            <div class="clearfix"><a href="#">Sponsored</a></div>
            <div id="unit{n}" class="ego_unit" data-ego-fbid="{n}" data-rect="900 {top} 250 200">
                <div class="uiSelector"><a id="sel{n}" href="#" data-gt='{{"data_to_log":{{"ad_id":"{ad_id}"}}}}'>x</a>
                    <ul><li data-label="Why am I seeing this?"><a ajaxify="{action}">Why?</a></li></ul>
                </div>
                <strong>Sidebar Brand {n}</strong>
            </div>
        </div>"##,
        action = action(ad_id)
    )
}

pub fn page(parts: &[String]) -> String {
    format!("<html><body>{}</body></html>", parts.concat())
}

/// Records requested actions and answers with a canned body, or fails.
#[derive(Clone, Default)]
pub struct FakeFetcher {
    reply: Option<String>,
    delay: Duration,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeFetcher {
    pub fn replying(body: String) -> Self {
        Self {
            reply: Some(body),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl DisclosureFetcher for FakeFetcher {
    fn fetch(&self, action: &str) -> BoxFuture<'static, Result<String>> {
        self.calls.lock().unwrap().push(action.to_string());
        let reply = self.reply.clone();
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;
            reply.ok_or_else(|| ScanError::Other("disclosure endpoint unavailable".to_string()))
        }
        .boxed()
    }
}
