//! Event handlers for the synthetic traces.
//!
//! Handlers keep no state of their own between events: everything they need
//! is read back from the state system. That is what lets a partial history
//! replay any window of the trace from a checkpoint.

use tracestate_provider::EventHandler;
use tracestate_statesystem::{StateSystemBuilder, StateSystemError};
use tracestate_types::{StateValue, TraceEvent};

pub const TICK: &str = "tick";
pub const SCHED_SWITCH: &str = "sched_switch";
pub const FUNC_ENTRY: &str = "func_entry";
pub const FUNC_EXIT: &str = "func_exit";
pub const SAMPLE: &str = "sample";
pub const THREAD_EXIT: &str = "thread_exit";

/// Counts tick events.
///
/// Every tick increments `counters/total` and stores the event rank in
/// `slots/<slot>`. With `s` slots the tree holds `s + 3` attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterHandler;

impl EventHandler for CounterHandler {
    fn handle_event(
        &mut self,
        ss: &dyn StateSystemBuilder,
        event: &TraceEvent,
    ) -> Result<(), StateSystemError> {
        if &*event.name != TICK {
            return Ok(());
        }
        let total = ss.get_quark_absolute_and_add(&["counters", "total"])?;
        ss.increment_attribute(event.timestamp, 1, total)?;

        if let Some(slot) = event.field("slot").and_then(StateValue::as_i64) {
            let quark = ss.get_quark_absolute_and_add(&["slots", &slot.to_string()])?;
            ss.modify_attribute(event.timestamp, StateValue::Int64(event.rank as i64), quark)?;
        }
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn EventHandler> {
        Box::new(*self)
    }
}

/// Models threads running on CPUs, from [`SyntheticTrace`](crate::SyntheticTrace)
/// events.
///
/// Attribute layout:
///
/// ```text
/// cpus/<cpu>/current       Int64   tid running on the CPU
/// cpus/<cpu>/load          Double  last load sample
/// threads/<tid>/name       String
/// threads/<tid>/status     String  "running" or "waiting"
/// threads/<tid>/callstack  stack of function names
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessHandler;

impl ProcessHandler {
    fn sched_switch(
        ss: &dyn StateSystemBuilder,
        event: &TraceEvent,
    ) -> Result<(), StateSystemError> {
        let (Some(cpu), Some(next)) = (int_field(event, "cpu"), int_field(event, "next_tid")) else {
            return Ok(());
        };
        let t = event.timestamp;
        let current = ss.get_quark_absolute_and_add(&["cpus", &cpu.to_string(), "current"])?;

        if let Some(previous) = ss.query_ongoing(current)?.as_i64() {
            if previous != next {
                let status =
                    ss.get_quark_absolute_and_add(&["threads", &previous.to_string(), "status"])?;
                ss.modify_attribute(t, StateValue::string("waiting"), status)?;
            }
        }
        ss.modify_attribute(t, StateValue::Int64(next), current)?;

        let thread = ss.get_quark_absolute_and_add(&["threads", &next.to_string()])?;
        if let Some(name) = event.field("next_comm") {
            let quark = ss.get_quark_relative_and_add(thread, &["name"])?;
            ss.modify_attribute(t, name.clone(), quark)?;
        }
        let status = ss.get_quark_relative_and_add(thread, &["status"])?;
        ss.modify_attribute(t, StateValue::string("running"), status)
    }

    fn callstack(
        ss: &dyn StateSystemBuilder,
        event: &TraceEvent,
    ) -> Result<Option<tracestate_types::Quark>, StateSystemError> {
        let Some(tid) = int_field(event, "tid") else {
            return Ok(None);
        };
        ss.get_quark_absolute_and_add(&["threads", &tid.to_string(), "callstack"])
            .map(Some)
    }
}

impl EventHandler for ProcessHandler {
    fn handle_event(
        &mut self,
        ss: &dyn StateSystemBuilder,
        event: &TraceEvent,
    ) -> Result<(), StateSystemError> {
        let t = event.timestamp;
        match &*event.name {
            SCHED_SWITCH => Self::sched_switch(ss, event),
            FUNC_ENTRY => {
                let (Some(stack), Some(function)) = (Self::callstack(ss, event)?, event.field("func"))
                else {
                    return Ok(());
                };
                ss.push_attribute(t, function.clone(), stack)
            }
            FUNC_EXIT => {
                if let Some(stack) = Self::callstack(ss, event)? {
                    ss.pop_attribute(t, stack)?;
                }
                Ok(())
            }
            SAMPLE => {
                let (Some(cpu), Some(load)) = (
                    int_field(event, "cpu"),
                    event.field("load").and_then(StateValue::as_f64),
                ) else {
                    return Ok(());
                };
                let quark = ss.get_quark_absolute_and_add(&["cpus", &cpu.to_string(), "load"])?;
                ss.modify_attribute(t, StateValue::Double(load), quark)
            }
            THREAD_EXIT => {
                let Some(tid) = int_field(event, "tid") else {
                    return Ok(());
                };
                match ss.get_quark_absolute(&["threads", &tid.to_string()]) {
                    Ok(thread) => ss.remove_attribute(t, thread),
                    Err(StateSystemError::AttributeNotFound { .. }) => Ok(()),
                    Err(error) => Err(error),
                }
            }
            _ => Ok(()),
        }
    }

    fn boxed_clone(&self) -> Box<dyn EventHandler> {
        Box::new(*self)
    }
}

fn int_field(event: &TraceEvent, name: &str) -> Option<i64> {
    event.field(name).and_then(StateValue::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracestate_statesystem::StateSystem;
    use tracestate_types::TraceId;

    fn null_system() -> StateSystem {
        StateSystem::new(Arc::new(tracestate_backend::NullBackend::new("handlers", 0)))
    }

    fn event(t: i64, name: &str) -> TraceEvent {
        TraceEvent::new(TraceId(1), t, 0, name)
    }

    #[test]
    fn test_counter_handler_counts_ticks() {
        let ss = null_system();
        let mut handler = CounterHandler;
        for t in 0..5 {
            handler
                .handle_event(&ss, &event(t, TICK).with_field("slot", t % 2))
                .unwrap();
        }
        handler.handle_event(&ss, &event(5, "other")).unwrap();

        let total = ss.get_quark_absolute(&["counters", "total"]).unwrap();
        assert_eq!(ss.query_ongoing(total).unwrap(), StateValue::Int64(5));
        // counters, total, slots, slots/0, slots/1
        assert_eq!(ss.attribute_count(), 5);
    }

    #[test]
    fn test_process_handler_callstack() {
        let ss = null_system();
        let mut handler = ProcessHandler;
        let enter = |t, func: &str| event(t, FUNC_ENTRY).with_field("tid", 3i64).with_field("func", func);

        handler.handle_event(&ss, &enter(1, "main")).unwrap();
        handler.handle_event(&ss, &enter(2, "read")).unwrap();
        let stack = ss.get_quark_absolute(&["threads", "3", "callstack"]).unwrap();
        assert_eq!(ss.query_ongoing(stack).unwrap(), StateValue::Int32(2));

        let exit = event(3, FUNC_EXIT).with_field("tid", 3i64);
        handler.handle_event(&ss, &exit).unwrap();
        handler.handle_event(&ss, &exit).unwrap();
        // Popping an empty stack is ignored.
        handler.handle_event(&ss, &exit).unwrap();
        assert_eq!(ss.query_ongoing(stack).unwrap(), StateValue::Null);
    }

    #[test]
    fn test_process_handler_sched_switch() {
        let ss = null_system();
        let mut handler = ProcessHandler;
        let switch = |t, tid: i64| {
            event(t, SCHED_SWITCH)
                .with_field("cpu", 0i64)
                .with_field("next_tid", tid)
                .with_field("next_comm", format!("worker-{tid}"))
        };

        handler.handle_event(&ss, &switch(1, 7)).unwrap();
        handler.handle_event(&ss, &switch(2, 8)).unwrap();

        let status = |tid: &str| {
            let quark = ss.get_quark_absolute(&["threads", tid, "status"]).unwrap();
            ss.query_ongoing(quark).unwrap()
        };
        assert_eq!(status("7"), StateValue::string("waiting"));
        assert_eq!(status("8"), StateValue::string("running"));

        handler
            .handle_event(&ss, &event(3, THREAD_EXIT).with_field("tid", 7i64))
            .unwrap();
        assert_eq!(status("7"), StateValue::Null);
    }
}
