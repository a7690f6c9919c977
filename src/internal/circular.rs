//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};

const MAX_DEPTH: usize = 1024;

// Thread-local resolution stack: (container identity, service name)
thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<(usize, &'static str)>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one frame of the thread-local resolution stack.
///
/// Frames are keyed by the resolving container as well as the service name,
/// so a nested scope resolving the same type while its parent is mid-factory
/// is not mistaken for a cycle.
pub(crate) struct ResolutionGuard {
    frame: (usize, &'static str),
}

impl ResolutionGuard {
    /// Pushes a frame, failing with the full path if it would close a cycle.
    pub(crate) fn enter(container: usize, name: &'static str) -> DiResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let frame = (container, name);

            // Circular detection BEFORE pushing the new frame
            if stack.contains(&frame) {
                let mut path: Vec<&'static str> = stack.iter().map(|(_, n)| *n).collect();
                path.push(name);
                return Err(DiError::Circular(path));
            }

            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }

            stack.push(frame);
            Ok(Self { frame })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(last) = stack.pop() {
                debug_assert_eq!(last, self.frame);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentering_the_same_frame_reports_the_path() {
        let _a = ResolutionGuard::enter(1, "A").unwrap();
        let _b = ResolutionGuard::enter(1, "B").unwrap();
        match ResolutionGuard::enter(1, "A") {
            Err(DiError::Circular(path)) => assert_eq!(path, vec!["A", "B", "A"]),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("cycle not detected"),
        }
    }

    #[test]
    fn same_name_in_another_container_is_allowed() {
        let _outer = ResolutionGuard::enter(1, "A").unwrap();
        assert!(ResolutionGuard::enter(2, "A").is_ok());
    }

    #[test]
    fn frames_pop_on_drop() {
        {
            let _a = ResolutionGuard::enter(7, "A").unwrap();
        }
        assert!(ResolutionGuard::enter(7, "A").is_ok());
    }
}
