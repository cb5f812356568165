//! Exposes profiling and tracing hooks around [`Engine::update`](crate::Engine::update).

use std::{fmt, time};

use crate::system::SystemId;

/// A handler that receives update-related events from the engine.
pub trait Tracer {
    /// Context from [`start_cycle`](Self::start_cycle) to [`end_cycle`](Self::end_cycle).
    type CycleContext;
    /// An update cycle starts.
    fn start_cycle(&self, dt: f64) -> Self::CycleContext;
    /// An update cycle ends. Also passes the number of systems that ran.
    fn end_cycle(&self, context: Self::CycleContext, dt: f64, systems: usize);

    /// Context from [`start_system`](Self::start_system) to [`end_system`](Self::end_system).
    type SystemContext;
    /// A system starts running.
    fn start_system(&self, id: SystemId, name: &str) -> Self::SystemContext;
    /// A system stops running.
    fn end_system(&self, context: Self::SystemContext, id: SystemId, name: &str);
}

struct ElapsedFmt(time::Instant);

impl fmt::Display for ElapsedFmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{:?}", self.0.elapsed()) }
}

/// An empty tracer.
pub struct Noop;

impl Tracer for Noop {
    type CycleContext = ();
    fn start_cycle(&self, _: f64) {}
    fn end_cycle(&self, (): (), _: f64, _: usize) {}

    type SystemContext = ();
    fn start_system(&self, _: SystemId, _: &str) {}
    fn end_system(&self, (): (), _: SystemId, _: &str) {}
}

/// Dispatches each call to both tracers in serial.
pub struct Aggregate<A, B>(
    /// The first tracer.
    pub A,
    /// The second tracer.
    pub B,
);

impl<A: Tracer, B: Tracer> Tracer for Aggregate<A, B> {
    type CycleContext = (A::CycleContext, B::CycleContext);
    fn start_cycle(&self, dt: f64) -> Self::CycleContext {
        (self.0.start_cycle(dt), self.1.start_cycle(dt))
    }
    fn end_cycle(&self, (a, b): Self::CycleContext, dt: f64, systems: usize) {
        self.0.end_cycle(a, dt, systems);
        self.1.end_cycle(b, dt, systems);
    }

    type SystemContext = (A::SystemContext, B::SystemContext);
    fn start_system(&self, id: SystemId, name: &str) -> Self::SystemContext {
        (self.0.start_system(id, name), self.1.start_system(id, name))
    }
    fn end_system(&self, (a, b): Self::SystemContext, id: SystemId, name: &str) {
        self.0.end_system(a, id, name);
        self.1.end_system(b, id, name);
    }
}

/// A tracer that logs all events with their elapsed time.
pub struct Log(
    /// The log level to log events with.
    pub log::Level,
);

impl Tracer for Log {
    type CycleContext = time::Instant;
    fn start_cycle(&self, dt: f64) -> time::Instant {
        log::log!(self.0, "start_cycle(dt = {dt})");
        time::Instant::now()
    }
    fn end_cycle(&self, context: time::Instant, dt: f64, systems: usize) {
        log::log!(
            self.0,
            "end_cycle(dt = {dt}, systems = {systems}) after {}",
            ElapsedFmt(context)
        );
    }

    type SystemContext = time::Instant;
    fn start_system(&self, id: SystemId, name: &str) -> time::Instant {
        log::log!(self.0, "start_system({id}, {name})");
        time::Instant::now()
    }
    fn end_system(&self, context: time::Instant, id: SystemId, name: &str) {
        log::log!(self.0, "end_system({id}, {name}) after {}", ElapsedFmt(context));
    }
}
