use cogex_core::Trial;

/// The trial currently drawn for display.
///
/// `onset` stays `None` until the view reports the stimulus on screen.
#[derive(Debug, Clone, Copy)]
pub struct PendingTrial<I> {
    pub index: usize,
    pub trial: Trial,
    pub onset: Option<I>,
}

