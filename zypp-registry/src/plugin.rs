//! Plugin notification channel. The plugin dispatch mechanism itself
//! (RIS/shell-script plugins) is out of scope; the registry only emits a
//! typed event the caller may drain (spec §4.7 `add`, §9 "supplemented
//! features").

use zypp_core::Alias;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PluginEvent {
    /// A repository's package set changed (add/remove/modify with a
    /// different origin or type).
    PackageSetChanged { alias: Alias },
    /// A service's repo set changed on reconciliation.
    ServicesChanged { service: Alias },
}

/// Owns the sending half; created alongside the registry that emits into
/// it, with the receiving half handed to whoever drains events.
#[derive(Clone)]
pub struct PluginEventSender(crossbeam_channel::Sender<PluginEvent>);

impl PluginEventSender {
    pub fn emit(&self, event: PluginEvent) {
        // A full channel (no receiver draining) must never block a
        // registry write; drop the event instead.
        let _ = self.0.try_send(event);
    }
}

/// Build a connected sender/receiver pair for plugin events.
pub fn channel() -> (PluginEventSender, crossbeam_channel::Receiver<PluginEvent>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (PluginEventSender(tx), rx)
}
