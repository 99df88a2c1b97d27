/// Callback that detaches a listener from whatever registered it.
pub type Unsubscribe = Box<dyn FnOnce() + Send + 'static>;

/// RAII listener handle: dropping it (or calling [`ListenerRegistration::detach`])
/// runs the unsubscribe callback exactly once.
pub struct ListenerRegistration {
    unsubscribe: Option<Unsubscribe>,
}

impl ListenerRegistration {
    pub fn new(unsubscribe: Unsubscribe) -> Self {
        Self {
            unsubscribe: Some(unsubscribe),
        }
    }

    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }

    pub fn detach(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.is_active())
            .finish()
    }
}
