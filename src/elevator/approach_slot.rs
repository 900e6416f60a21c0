//! Single-slot handoff for approach confirmations, plus the externally toggled fault flags.

use crate::shared::ApproachEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// One writer (the elevator subsystem) delivers, one reader (the elevator) takes.
/// A delivery overwrites whatever confirmation has not been taken yet.
pub struct ApproachSlot {
    slot: Mutex<Option<ApproachEvent>>,
    delivered: Condvar,
}

impl ApproachSlot {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            delivered: Condvar::new(),
        }
    }

    pub fn deliver(&self, event: ApproachEvent) {
        let mut guard = self.slot.lock().expect("approach slot mutex poisoned");
        *guard = Some(event);
        self.delivered.notify_one();
    }

    /// Block until a confirmation is present and take it.
    pub fn wait(&self) -> ApproachEvent {
        let mut guard = self.slot.lock().expect("approach slot mutex poisoned");
        loop {
            if let Some(event) = guard.take() {
                return event;
            }
            guard = self.delivered.wait(guard).expect("condvar wait failed");
        }
    }

    /// Like `wait`, but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ApproachEvent> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.slot.lock().expect("approach slot mutex poisoned");
        loop {
            if let Some(event) = guard.take() {
                return Some(event);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            // Spurious wakeups land back in the loop with less time left
            let (next, _) = self
                .delivered
                .wait_timeout(guard, remaining)
                .expect("condvar wait failed");
            guard = next;
        }
    }

    /// Discards a pending confirmation.
    pub fn clear(&self) {
        let mut guard = self.slot.lock().expect("approach slot mutex poisoned");
        guard.take();
    }
}

impl Default for ApproachSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Malfunction switches written from outside the control loop.
#[derive(Default)]
pub struct FaultFlags {
    doors_malfunctioning: AtomicBool,
    cart_malfunctioning: AtomicBool,
}

impl FaultFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_doors_malfunctioning(&self, value: bool) {
        self.doors_malfunctioning.store(value, Ordering::SeqCst);
    }

    pub fn set_cart_malfunctioning(&self, value: bool) {
        self.cart_malfunctioning.store(value, Ordering::SeqCst);
    }

    pub fn cart_malfunctioning(&self) -> bool {
        self.cart_malfunctioning.load(Ordering::SeqCst)
    }

    /// Reads and resets the door flag in one step.
    pub fn take_doors_malfunction(&self) -> bool {
        self.doors_malfunctioning.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
impl FaultFlags {
    pub fn doors_malfunctioning(&self) -> bool {
        self.doors_malfunctioning.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod approach_slot_tests {
    use super::*;
    use crate::shared::{Direction, Origin};
    use std::sync::Arc;
    use std::thread;
    use std::time::SystemTime;

    fn approach(floor: u8) -> ApproachEvent {
        ApproachEvent {
            time: SystemTime::now(),
            floor,
            direction: Direction::Up,
            elevator_id: 1,
            origin: Origin::ElevatorSystem,
        }
    }

    #[test]
    fn test_wait_returns_delivered_event() {
        // Arrange
        let slot = Arc::new(ApproachSlot::new());
        let writer = Arc::clone(&slot);

        // Act
        let handle = thread::spawn(move || slot.wait());
        thread::sleep(Duration::from_millis(20));
        writer.deliver(approach(4));

        // Assert
        assert_eq!(handle.join().unwrap().floor, 4);
    }

    #[test]
    fn test_wait_timeout_expires() {
        let slot = ApproachSlot::new();

        let started = Instant::now();
        let result = slot.wait_timeout(Duration::from_millis(50));

        assert!(result.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_new_delivery_overwrites_stale_one() {
        let slot = ApproachSlot::new();

        slot.deliver(approach(2));
        slot.deliver(approach(3));

        assert_eq!(slot.wait_timeout(Duration::from_millis(10)).unwrap().floor, 3);
        assert!(slot.wait_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_take_doors_malfunction_resets_flag() {
        let flags = FaultFlags::new();
        flags.set_doors_malfunctioning(true);

        assert!(flags.take_doors_malfunction());
        assert!(!flags.doors_malfunctioning());
        assert!(!flags.take_doors_malfunction());
    }
}
