//! Once-per-context attachment guard.

use std::sync::Arc;

use dashmap::DashMap;
use soultrace_core_types::ContextId;

/// Tracks which execution contexts already host a live capture layer.
///
/// A re-injected capture script asks for a claim before initializing; a
/// context that is already claimed gets `None` and must not attach again.
#[derive(Clone, Debug, Default)]
pub struct InjectionRegistry {
    live: Arc<DashMap<ContextId, ()>>,
}

impl InjectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, context: &ContextId) -> Option<InjectionGuard> {
        use dashmap::mapref::entry::Entry;
        match self.live.entry(context.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(InjectionGuard {
                    registry: self.clone(),
                    context: context.clone(),
                })
            }
        }
    }

    pub fn is_claimed(&self, context: &ContextId) -> bool {
        self.live.contains_key(context)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

/// Held for as long as the context's capture layer lives; dropping it
/// (page teardown) frees the context for the next injection.
#[derive(Debug)]
pub struct InjectionGuard {
    registry: InjectionRegistry,
    context: ContextId,
}

impl InjectionGuard {
    pub fn context(&self) -> &ContextId {
        &self.context
    }
}

impl Drop for InjectionGuard {
    fn drop(&mut self) {
        self.registry.live.remove(&self.context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_on_live_context_is_refused() {
        let registry = InjectionRegistry::new();
        let ctx = ContextId::new();
        let guard = registry.claim(&ctx).expect("first claim");
        assert!(registry.claim(&ctx).is_none());
        assert!(registry.claim(&ContextId::new()).is_some());
        drop(guard);
        assert!(!registry.is_claimed(&ctx));
        assert!(registry.claim(&ctx).is_some());
    }
}
