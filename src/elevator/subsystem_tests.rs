/*
 * Unit tests for the elevator subsystem
 *
 * The unit tests follows the Arrange, Act, Assert pattern.
 *
 * Tests:
 * - test_destination_waits_for_pickup
 * - test_pickup_behind_elevator_is_served_first
 * - test_assignment_for_unknown_elevator_is_dropped
 * - test_approach_confirmation_reaches_elevator
 * - test_fault_injector_commands
 */

/***************************************/
/*             Unit tests              */
/***************************************/
#[cfg(test)]
mod subsystem_tests {
    use crate::config::ElevatorConfig;
    use crate::elevator::ElevatorSubsystem;
    use crate::network::Endpoint;
    use crate::shared::{AssignmentRequest, Direction, DoorState, Origin, StopRequest, SystemEvent};
    use crossbeam_channel::unbounded;
    use std::thread::{sleep, spawn};
    use std::time::{Duration, Instant};

    fn config() -> ElevatorConfig {
        ElevatorConfig {
            n_elevators: 2,
            n_floors: 10,
            travel_time: 1000,
            door_time: 0,
        }
    }

    fn assignment(elevator_id: u8, floor: u8, destination_floor: u8) -> SystemEvent {
        let mut request = AssignmentRequest::new(floor, Direction::Up, destination_floor, Origin::ElevatorSystem);
        request.elevator_id = Some(elevator_id);
        SystemEvent::Assignment(request)
    }

    #[test]
    fn test_destination_waits_for_pickup() {
        // Arrange
        let mut subsystem = ElevatorSubsystem::new();
        let (_terminate_tx, terminate_rx) = unbounded::<()>();
        let mut elevator = subsystem.add_elevator(1, &config(), terminate_rx);

        // Act
        subsystem.deliver(assignment(1, 3, 6));
        elevator.drain_requests();

        // Assert: only the pickup is queued, and the elevator still reports work
        assert_eq!(elevator.queue().current_floors(), vec![3]);
        assert!(!elevator.make_status().no_pending_work);
    }

    #[test]
    fn test_pickup_behind_elevator_is_served_first() {
        // Arrange: elevator on floor 5 serving up, passenger on floor 3 going up to 7
        let mut subsystem = ElevatorSubsystem::new();
        let (_terminate_tx, terminate_rx) = unbounded::<()>();
        let mut elevator = subsystem.add_elevator(1, &config(), terminate_rx);
        elevator.test_set_floor(5);

        // Act
        subsystem.deliver(assignment(1, 3, 7));
        elevator.drain_requests();
        assert!(elevator.queue().current_floors().is_empty());
        assert_eq!(elevator.queue().missed_floors(), vec![3]);

        let handle = spawn(move || {
            let result = elevator.move_elevator_while_possible();
            (elevator, result)
        });
        let mut approached = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() && Instant::now() < deadline {
            match subsystem.next_outbound() {
                Some(SystemEvent::Approach(approach)) => {
                    approached.push(approach.floor);
                    subsystem.deliver(SystemEvent::Approach(approach));
                }
                Some(_) => {}
                None => sleep(Duration::from_millis(5)),
            }
        }

        // Assert: down to the pickup first, then up to the destination
        let (elevator, result) = handle.join().unwrap();
        assert_eq!(result, Ok(()));
        assert_eq!(approached, vec![4, 3, 4, 5, 6, 7]);
        assert_eq!(elevator.current_floor(), 7);
        assert!(elevator.queue().is_empty());
    }

    #[test]
    fn test_assignment_for_unknown_elevator_is_dropped() {
        let mut subsystem = ElevatorSubsystem::new();
        let (_terminate_tx, terminate_rx) = unbounded::<()>();
        let _elevator = subsystem.add_elevator(1, &config(), terminate_rx);

        subsystem.deliver(assignment(7, 3, 6));

        assert!(subsystem.next_outbound().is_none());
    }

    #[test]
    fn test_approach_confirmation_reaches_elevator() {
        // Arrange
        let mut subsystem = ElevatorSubsystem::new();
        let (_terminate_tx, terminate_rx) = unbounded::<()>();
        let mut elevator = subsystem.add_elevator(2, &config(), terminate_rx);
        let target = StopRequest::new(2, Direction::Up, Origin::ElevatorSystem);
        elevator.add_request(target.clone());

        // Act
        let handle = spawn(move || {
            let result = elevator.move_to_next_floor(&target);
            (elevator, result)
        });
        let approach = loop {
            match subsystem.next_outbound() {
                Some(SystemEvent::Approach(approach)) => break approach,
                Some(_) => {}
                None => sleep(Duration::from_millis(5)),
            }
        };
        subsystem.deliver(SystemEvent::Approach(approach));

        // Assert
        let (elevator, result) = handle.join().unwrap();
        assert!(result.is_ok());
        assert_eq!(elevator.current_floor(), 2);
    }

    #[test]
    fn test_fault_injector_commands() {
        // Arrange
        let mut subsystem = ElevatorSubsystem::new();
        let (_terminate_tx, terminate_rx) = unbounded::<()>();
        let mut elevator = subsystem.add_elevator(1, &config(), terminate_rx);
        let injector = subsystem.fault_injector();

        // Act, Assert
        assert!(injector.apply_command("door 1").is_ok());
        assert!(injector.apply_command("cart 1 off").is_ok());
        assert!(injector.apply_command("door 9").is_err());
        assert!(injector.apply_command("engine 1").is_err());
        assert!(injector.apply_command("door x").is_err());
        assert!(injector.apply_command("").is_err());

        assert_eq!(elevator.change_door_state(DoorState::Closed), Ok(false));
    }
}
