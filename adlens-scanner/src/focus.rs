use crate::host::{HostDocument, SelectionRange};
use std::ops::{Deref, DerefMut};

/// Saves the host's focus and text selection, and puts them back when
/// dropped, whichever way the interaction in between ends.
pub struct FocusGuard<'a, H: HostDocument> {
    host: &'a mut H,
    focus: Option<H::Node>,
    selection: Vec<SelectionRange<H::Node>>,
}

impl<'a, H: HostDocument> FocusGuard<'a, H> {
    pub fn acquire(host: &'a mut H) -> Self {
        let focus = host.active_element();
        let selection = host.selection_ranges();
        Self {
            host,
            focus,
            selection,
        }
    }
}

impl<H: HostDocument> Deref for FocusGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: HostDocument> DerefMut for FocusGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: HostDocument> Drop for FocusGuard<'_, H> {
    fn drop(&mut self) {
        if let Some(focus) = self.focus.take() {
            self.host.focus(&focus);
        }
        if !self.selection.is_empty() {
            self.host
                .set_selection_ranges(std::mem::take(&mut self.selection));
        }
    }
}
