use booking::Reconciler;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) reconciler: Reconciler,
}
