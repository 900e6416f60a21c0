/*
 * Unit tests for the dispatcher module
 *
 * The unit tests follows the Arrange, Act, Assert pattern.
 *
 * Tests:
 *  - test_dispatcher_init
 *  - test_idle_elevator_is_preferred
 *  - test_first_idle_elevator_by_id_wins
 *  - test_tier_ranking
 *  - test_best_tier_beats_shorter_queue
 *  - test_tie_break_on_queue_time
 *  - test_stuck_elevators_are_never_chosen
 *  - test_status_updates_cache_and_reaches_floors
 *  - test_stop_request_becomes_assignment
 *  - test_invalid_origin_is_rejected
 *  - test_undispatchable_request_is_dropped
 *  - test_status_from_unknown_elevator_is_rejected
 *  - test_approach_events_cross_over
 *  - test_dispatcher_terminate
 */

/***************************************/
/*             Unit tests              */
/***************************************/
#[cfg(test)]
mod dispatcher_tests {
    use crate::dispatcher::dispatcher::{DispatchError, Tier};
    use crate::dispatcher::Dispatcher;
    use crate::shared::{
        ApproachEvent, AssignmentRequest, Direction, ElevatorStatus, Fault, MovementState, Origin, StopRequest,
        SystemEvent,
    };
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::thread::Builder;
    use std::time::{Duration, SystemTime};

    struct Harness {
        dispatcher: Dispatcher,
        floor_inbound_tx: Sender<SystemEvent>,
        elevator_inbound_tx: Sender<SystemEvent>,
        floor_outbound_rx: Receiver<SystemEvent>,
        elevator_outbound_rx: Receiver<SystemEvent>,
        terminate_tx: Sender<()>,
    }

    fn setup_dispatcher(n_elevators: u8) -> Harness {
        // Arrange mock channels
        let (floor_inbound_tx, floor_inbound_rx) = unbounded::<SystemEvent>();
        let (elevator_inbound_tx, elevator_inbound_rx) = unbounded::<SystemEvent>();
        let (floor_outbound_tx, floor_outbound_rx) = unbounded::<SystemEvent>();
        let (elevator_outbound_tx, elevator_outbound_rx) = unbounded::<SystemEvent>();
        let (terminate_tx, terminate_rx) = unbounded::<()>();

        Harness {
            dispatcher: Dispatcher::new(
                n_elevators,
                floor_inbound_rx,
                elevator_inbound_rx,
                floor_outbound_tx,
                elevator_outbound_tx,
                terminate_rx,
            ),
            floor_inbound_tx,
            elevator_inbound_tx,
            floor_outbound_rx,
            elevator_outbound_rx,
            terminate_tx,
        }
    }

    fn status(id: u8, floor: u8, direction: Direction, state: MovementState, queue_secs: u64) -> ElevatorStatus {
        let mut status = ElevatorStatus::new(id);
        status.current_floor = floor;
        status.service_direction = direction;
        status.movement_state = state;
        status.estimated_queue_time = Duration::from_secs(queue_secs);
        status.no_pending_work = state == MovementState::Idle;
        status
    }

    fn report(harness: &mut Harness, status: ElevatorStatus) {
        harness.dispatcher.process_data(SystemEvent::Status(status)).unwrap();
        harness.floor_outbound_rx.try_iter().for_each(drop);
    }

    fn request(floor: u8, direction: Direction) -> AssignmentRequest {
        AssignmentRequest::new(floor, direction, floor, Origin::FloorSystem)
    }

    #[test]
    fn test_dispatcher_init() {
        // Arrange
        let harness = setup_dispatcher(2);

        // Assert
        for id in 1..=2 {
            let view = harness.dispatcher.elevator_view(id).unwrap();
            assert_eq!(view.current_floor, 1);
            assert_eq!(view.movement_state, MovementState::Idle);
        }
        assert!(harness.dispatcher.elevator_view(3).is_none());
    }

    #[test]
    fn test_idle_elevator_is_preferred() {
        // Arrange: #1 idle at floor 1, #2 moving up from floor 2 with work queued
        let mut harness = setup_dispatcher(2);
        report(&mut harness, status(1, 1, Direction::Up, MovementState::Idle, 0));
        report(&mut harness, status(2, 2, Direction::Up, MovementState::Active, 5));

        // Act
        let chosen = harness.dispatcher.choose_elevator(&request(3, Direction::Up));

        // Assert
        assert_eq!(chosen, Some(1));
    }

    #[test]
    fn test_first_idle_elevator_by_id_wins() {
        let mut harness = setup_dispatcher(3);
        report(&mut harness, status(1, 4, Direction::Up, MovementState::Active, 1));

        assert_eq!(harness.dispatcher.choose_elevator(&request(9, Direction::Down)), Some(2));
    }

    #[test]
    fn test_tier_ranking() {
        let moving_up = status(1, 3, Direction::Up, MovementState::Active, 0);
        let moving_down = status(1, 6, Direction::Down, MovementState::Active, 0);

        assert_eq!(Dispatcher::tier_for(&moving_up, &request(6, Direction::Up)), Tier::Best);
        assert_eq!(Dispatcher::tier_for(&moving_up, &request(6, Direction::Down)), Tier::Ok);
        assert_eq!(Dispatcher::tier_for(&moving_up, &request(2, Direction::Up)), Tier::Worst);
        // About to reach floor 4, too late to stop there
        assert_eq!(Dispatcher::tier_for(&moving_up, &request(4, Direction::Up)), Tier::Worst);

        assert_eq!(Dispatcher::tier_for(&moving_down, &request(2, Direction::Down)), Tier::Best);
        assert_eq!(Dispatcher::tier_for(&moving_down, &request(5, Direction::Down)), Tier::Worst);
        assert_eq!(Dispatcher::tier_for(&moving_down, &request(2, Direction::Up)), Tier::Ok);
    }

    #[test]
    fn test_best_tier_beats_shorter_queue() {
        // Arrange: #1 has already passed floor 3, #2 is heading towards it with more work queued
        let mut harness = setup_dispatcher(2);
        report(&mut harness, status(1, 5, Direction::Up, MovementState::Active, 1));
        report(&mut harness, status(2, 1, Direction::Up, MovementState::Active, 30));

        // Act, Assert
        assert_eq!(harness.dispatcher.choose_elevator(&request(3, Direction::Up)), Some(2));
        assert_eq!(harness.dispatcher.choose_elevator(&request(3, Direction::Down)), Some(1));
    }

    #[test]
    fn test_tie_break_on_queue_time() {
        let mut harness = setup_dispatcher(3);
        report(&mut harness, status(1, 1, Direction::Up, MovementState::Active, 12));
        report(&mut harness, status(2, 2, Direction::Up, MovementState::Active, 4));
        report(&mut harness, status(3, 1, Direction::Up, MovementState::Active, 4));

        assert_eq!(harness.dispatcher.choose_elevator(&request(8, Direction::Up)), Some(2));
    }

    #[test]
    fn test_stuck_elevators_are_never_chosen() {
        // Arrange
        let mut harness = setup_dispatcher(2);
        report(&mut harness, status(1, 1, Direction::Up, MovementState::Stuck, 0));
        let mut faulted = status(2, 1, Direction::Up, MovementState::Idle, 0);
        faulted.fault = Fault::ArrivalSensorFail;
        report(&mut harness, faulted);

        // Act
        let chosen = harness.dispatcher.choose_elevator(&request(3, Direction::Up));

        // Assert
        assert_eq!(chosen, None);
    }

    #[test]
    fn test_status_updates_cache_and_reaches_floors() {
        // Arrange
        let mut harness = setup_dispatcher(1);
        let update = status(1, 7, Direction::Down, MovementState::Active, 3);

        // Act
        let result = harness.dispatcher.process_data(SystemEvent::Status(update.clone()));

        // Assert
        assert_eq!(result, Ok(()));
        assert_eq!(harness.dispatcher.elevator_view(1).unwrap().current_floor, 7);
        match harness.floor_outbound_rx.try_recv() {
            Ok(SystemEvent::Status(forwarded)) => {
                assert_eq!(forwarded.origin, Origin::FloorSystem);
                assert_eq!(forwarded.current_floor, 7);
            }
            other => panic!("Expected a forwarded status, got {:?}", other),
        }
        assert!(harness.elevator_outbound_rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_request_becomes_assignment() {
        // Arrange
        let mut harness = setup_dispatcher(2);
        let stop = StopRequest::new(4, Direction::Down, Origin::FloorSystem);

        // Act
        harness.dispatcher.process_data(SystemEvent::Stop(stop)).unwrap();

        // Assert
        match harness.elevator_outbound_rx.try_recv() {
            Ok(SystemEvent::Assignment(assignment)) => {
                assert_eq!(assignment.elevator_id, Some(1));
                assert_eq!(assignment.floor, 4);
                assert_eq!(assignment.destination_floor, 4);
                assert_eq!(assignment.origin, Origin::ElevatorSystem);
            }
            other => panic!("Expected an assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_origin_is_rejected() {
        // Arrange
        let mut harness = setup_dispatcher(1);
        let mut bogus = status(1, 9, Direction::Up, MovementState::Stuck, 0);
        bogus.origin = Origin::Scheduler;

        // Act
        let result = harness.dispatcher.process_data(SystemEvent::Status(bogus));

        // Assert: nothing forwarded, cache untouched
        assert_eq!(result, Err(DispatchError::InvalidOrigin(Origin::Scheduler)));
        assert_eq!(harness.dispatcher.elevator_view(1).unwrap().current_floor, 1);
        assert!(harness.floor_outbound_rx.try_recv().is_err());
        assert!(harness.elevator_outbound_rx.try_recv().is_err());
    }

    #[test]
    fn test_undispatchable_request_is_dropped() {
        let mut harness = setup_dispatcher(1);
        report(&mut harness, status(1, 1, Direction::Up, MovementState::Stuck, 0));

        let result = harness
            .dispatcher
            .process_data(SystemEvent::Assignment(AssignmentRequest::new(2, Direction::Up, 5, Origin::FloorSystem)));

        assert_eq!(
            result,
            Err(DispatchError::NoEligibleElevator {
                floor: 2,
                direction: Direction::Up
            })
        );
        assert!(harness.elevator_outbound_rx.try_recv().is_err());
    }

    #[test]
    fn test_status_from_unknown_elevator_is_rejected() {
        let mut harness = setup_dispatcher(2);

        let result = harness
            .dispatcher
            .process_data(SystemEvent::Status(status(5, 3, Direction::Up, MovementState::Idle, 0)));

        assert_eq!(result, Err(DispatchError::UnknownElevator(5)));
        assert!(harness.dispatcher.elevator_view(5).is_none());
        assert!(harness.floor_outbound_rx.try_recv().is_err());
    }

    #[test]
    fn test_approach_events_cross_over() {
        // Arrange
        let mut harness = setup_dispatcher(1);
        let approach = ApproachEvent {
            time: SystemTime::now(),
            floor: 2,
            direction: Direction::Up,
            elevator_id: 1,
            origin: Origin::ElevatorSystem,
        };

        // Act: elevator -> floor, then the floor's echo -> elevator
        harness.dispatcher.process_data(SystemEvent::Approach(approach)).unwrap();
        let at_floor = harness.floor_outbound_rx.try_recv().unwrap();
        harness.dispatcher.process_data(at_floor.clone()).unwrap();
        let at_elevator = harness.elevator_outbound_rx.try_recv().unwrap();

        // Assert
        assert_eq!(at_floor.origin(), Origin::FloorSystem);
        assert_eq!(at_elevator.origin(), Origin::ElevatorSystem);
    }

    #[test]
    fn test_dispatcher_terminate() {
        // Arrange
        let Harness {
            mut dispatcher,
            floor_inbound_tx,
            elevator_inbound_tx,
            elevator_outbound_rx,
            terminate_tx,
            ..
        } = setup_dispatcher(1);
        let handle = Builder::new()
            .name("dispatcher".into())
            .spawn(move || dispatcher.run())
            .unwrap();

        // Act
        floor_inbound_tx
            .send(SystemEvent::Stop(StopRequest::new(3, Direction::Up, Origin::FloorSystem)))
            .unwrap();
        let forwarded = elevator_outbound_rx.recv_timeout(Duration::from_secs(1));
        terminate_tx.send(()).unwrap();

        // Assert
        assert!(matches!(forwarded, Ok(SystemEvent::Assignment(_))));
        handle.join().unwrap();
        drop(elevator_inbound_tx);
    }
}
