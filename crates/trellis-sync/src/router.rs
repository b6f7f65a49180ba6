//! Inbound topic routing.
//!
//! Routes bind a compiled topic pattern to a handler. The table is built
//! once at startup and never changes afterwards; messages on topics for
//! devices or sensors created later are unroutable by design, which makes
//! the route table a configuration-time constraint rather than a runtime
//! one.
//!
//! Dispatch catches handler errors at the boundary so a single malformed or
//! unexpected message never takes the dispatch loop down. Messages whose
//! target simply is not known to this process are dropped quietly; real
//! failures are logged as warnings.

use tracing::{debug, warn};
use trellis_core::{PatternError, SettingsError, TopicPattern};

/// Handler invoked with the extracted placeholder bindings (in declaration
/// order) and the message payload.
pub type Handler = Box<dyn Fn(&[String], &str) -> Result<(), SettingsError> + Send + Sync>;

struct Route {
    pattern: TopicPattern,
    handler: Handler,
}

/// Fixed table of topic routes.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

fn is_unknown_target(err: &SettingsError) -> bool {
    matches!(
        err,
        SettingsError::UnknownDevice(_)
            | SettingsError::UnknownSetting { .. }
            | SettingsError::UnknownSensor(_)
    )
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a route. The pattern is compiled once, here.
    pub fn route(&mut self, pattern: &str, handler: Handler) -> Result<(), PatternError> {
        self.routes.push(Route {
            pattern: TopicPattern::new(pattern)?,
            handler,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch one inbound message.
    ///
    /// The first matching route wins. Handler errors are caught here and
    /// logged; unmatched topics are silently dropped. Returns whether a
    /// route matched.
    pub fn dispatch(&self, topic: &str, payload: &str) -> bool {
        for route in &self.routes {
            if let Some(bindings) = route.pattern.captures(topic) {
                match (route.handler)(&bindings, payload) {
                    Ok(()) => {}
                    Err(e) if is_unknown_target(&e) => {
                        debug!("dropping message on '{}' for unknown target: {}", topic, e);
                    }
                    Err(e) => {
                        warn!("handler failed for '{}': {}", topic, e);
                    }
                }
                return true;
            }
        }
        debug!("no route matched '{}', message dropped", topic);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_dispatch_passes_bindings_and_payload() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut router = Router::new();
        router
            .route(
                "devices/<device>/<setting>/value",
                Box::new(move |bindings, payload| {
                    sink.lock().unwrap().push((bindings.to_vec(), payload.to_string()));
                    Ok(())
                }),
            )
            .unwrap();

        assert!(router.dispatch("devices/water_pump/duty_cycle/value", "12.5"));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(
                vec!["water_pump".to_string(), "duty_cycle".to_string()],
                "12.5".to_string()
            )]
        );
    }

    #[test]
    fn test_first_match_wins() {
        static FIRST: AtomicUsize = AtomicUsize::new(0);
        static SECOND: AtomicUsize = AtomicUsize::new(0);

        let mut router = Router::new();
        router
            .route(
                "sensors/<sensor>/value",
                Box::new(|_, _| {
                    FIRST.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();
        router
            .route(
                "sensors/inside_temp/value",
                Box::new(|_, _| {
                    SECOND.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        router.dispatch("sensors/inside_temp/value", "21.5");
        assert_eq!(FIRST.load(Ordering::SeqCst), 1);
        assert_eq!(SECOND.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unmatched_topic_is_dropped() {
        let mut router = Router::new();
        router
            .route("devices/<device>/<setting>/value", Box::new(|_, _| Ok(())))
            .unwrap();

        assert!(!router.dispatch("somewhere/else", "payload"));
    }

    #[test]
    fn test_handler_error_is_contained() {
        let mut router = Router::new();
        router
            .route(
                "devices/<device>/<setting>/value",
                Box::new(|bindings, _| {
                    Err(SettingsError::UnknownDevice(bindings[0].clone()))
                }),
            )
            .unwrap();

        // the error is swallowed at the dispatch boundary
        assert!(router.dispatch("devices/ghost/duty_cycle/value", "1"));
        // and the loop stays usable
        assert!(router.dispatch("devices/ghost/duty_cycle/value", "2"));
    }

    #[test]
    fn test_invalid_pattern_rejected_at_registration() {
        let mut router = Router::new();
        let err = router
            .route("devices/<device/value", Box::new(|_, _| Ok(())))
            .unwrap_err();
        assert!(matches!(err, PatternError::InvalidPlaceholder(_)));
        assert!(router.is_empty());
    }
}
