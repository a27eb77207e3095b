//! Tick handler contract.
//!
//! A handler is the single override point of a timer: it is called once
//! per tick, with no arguments and no return value, always from the timer's
//! own thread and never concurrently with itself.

/// Periodic action invoked by a [`PreciseTimer`](crate::timer::PreciseTimer).
///
/// Any `FnMut() + Send + 'static` closure is a handler. Types that need to
/// expose collected state after the timer stops implement the trait directly
/// and are read back through [`PreciseTimer::handler`](crate::timer::PreciseTimer::handler).
pub trait TickHandler: Send + 'static {
    /// Run one tick.
    fn on_tick(&mut self);
}

impl<F> TickHandler for F
where
    F: FnMut() + Send + 'static,
{
    #[inline]
    fn on_tick(&mut self) {
        self();
    }
}
