use crate::shared::{Direction, MovementState};

/// The mechanism that moves an elevator one floor at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevatorMotor {
    movement_state: MovementState,
    direction: Direction,
}

impl ElevatorMotor {
    pub fn new() -> ElevatorMotor {
        ElevatorMotor {
            movement_state: MovementState::Idle,
            direction: Direction::None,
        }
    }

    pub fn movement_state(&self) -> MovementState {
        self.movement_state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Floor reached after one step from `current_floor` towards `target_floor`.
    pub fn next_floor(&self, current_floor: u8, target_floor: u8) -> u8 {
        match Direction::between(current_floor, target_floor) {
            Direction::Up => current_floor + 1,
            Direction::Down => current_floor - 1,
            Direction::None => current_floor,
        }
    }

    /// Points the motor towards `next_floor`. Staying on the same floor keeps the old direction.
    pub fn change_direction(&mut self, current_floor: u8, next_floor: u8) {
        let direction = Direction::between(current_floor, next_floor);
        if direction != Direction::None {
            self.direction = direction;
        }
    }

    pub fn start_moving(&mut self) {
        self.movement_state = MovementState::Active;
    }

    pub fn stop(&mut self) {
        self.movement_state = MovementState::Idle;
        self.direction = Direction::None;
    }

    /// Locks the motor. There is no way back to a working state.
    pub fn jam(&mut self) {
        self.movement_state = MovementState::Stuck;
        self.direction = Direction::None;
    }
}

#[cfg(test)]
impl ElevatorMotor {
    pub fn is_idle(&self) -> bool {
        self.movement_state == MovementState::Idle
    }

    pub fn is_active(&self) -> bool {
        self.movement_state == MovementState::Active
    }
}

impl Default for ElevatorMotor {
    fn default() -> Self {
        ElevatorMotor::new()
    }
}

#[cfg(test)]
mod motor_tests {
    use super::*;

    #[test]
    fn test_next_floor_moves_one_floor() {
        let motor = ElevatorMotor::new();

        assert_eq!(motor.next_floor(3, 5), 4);
        assert_eq!(motor.next_floor(3, 1), 2);
        assert_eq!(motor.next_floor(3, 3), 3);
    }

    #[test]
    fn test_start_and_stop() {
        // Arrange
        let mut motor = ElevatorMotor::new();

        // Act
        motor.start_moving();
        motor.change_direction(2, 1);

        // Assert
        assert!(motor.is_active());
        assert_eq!(motor.direction(), Direction::Down);

        motor.stop();
        assert!(motor.is_idle());
        assert_eq!(motor.direction(), Direction::None);
    }

    #[test]
    fn test_jam() {
        let mut motor = ElevatorMotor::new();
        motor.start_moving();

        motor.jam();

        assert_eq!(motor.movement_state(), MovementState::Stuck);
        assert!(!motor.is_idle());
        assert!(!motor.is_active());
    }
}
