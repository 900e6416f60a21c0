use crate::shared::{Direction, StopRequest};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/**
 * Pending stops of a single elevator.
 *
 * Requests are partitioned relative to the elevator's service direction and position:
 * - `current`:  on the elevator's path in the service direction, removed in travel order.
 * - `opposite`: requests for the reverse direction, served after the next direction swap.
 * - `missed`:   requests in the service direction whose floor has already been passed.
 *
 * Each sub-queue is keyed by floor, so a floor appears at most once per sub-queue and
 * iteration order is always monotonic in floor number.
 */
#[derive(Debug, Clone)]
pub struct RequestQueue {
    current: BTreeMap<u8, StopRequest>,
    opposite: BTreeMap<u8, StopRequest>,
    missed: BTreeMap<u8, StopRequest>,
    direction: Direction,
}

impl RequestQueue {
    pub fn new() -> RequestQueue {
        RequestQueue {
            current: BTreeMap::new(),
            opposite: BTreeMap::new(),
            missed: BTreeMap::new(),
            direction: Direction::Up,
        }
    }

    /// Files `request` into the sub-queue it belongs to. A floor already present in
    /// that sub-queue is left untouched.
    pub fn add_request(&mut self, elevator_floor: u8, service_direction: Direction, request: StopRequest) {
        if service_direction != Direction::None {
            self.direction = service_direction;
        }

        let same_direction = request.direction == Direction::None || request.direction == self.direction;
        let ahead = match self.direction {
            Direction::Up => request.floor >= elevator_floor,
            Direction::Down => request.floor <= elevator_floor,
            Direction::None => true,
        };

        let target = match (same_direction, ahead) {
            (true, true) => &mut self.current,
            (true, false) => &mut self.missed,
            (false, _) => &mut self.opposite,
        };
        target.entry(request.floor).or_insert(request);
    }

    /// Removes the next stop of the current sub-queue in travel order.
    pub fn remove_request(&mut self) -> Option<StopRequest> {
        let floor = Self::head_floor(&self.current, self.direction)?;
        self.current.remove(&floor)
    }

    pub fn peek_next_request(&self) -> Option<&StopRequest> {
        let floor = Self::head_floor(&self.current, self.direction)?;
        self.current.get(&floor)
    }

    pub fn is_current_queue_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn is_opposite_queue_empty(&self) -> bool {
        self.opposite.is_empty()
    }

    pub fn is_missed_queue_empty(&self) -> bool {
        self.missed.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.opposite.is_empty() && self.missed.is_empty()
    }

    /// Floors of each sub-queue in the order they would be removed.
    pub fn current_floors(&self) -> Vec<u8> {
        Self::ordered(&self.current, self.direction)
    }

    pub fn opposite_floors(&self) -> Vec<u8> {
        Self::ordered(&self.opposite, self.direction.opposite())
    }

    pub fn missed_floors(&self) -> Vec<u8> {
        Self::ordered(&self.missed, self.direction)
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.opposite.len() + self.missed.len()
    }

    /**
     * Refills the current sub-queue once it has run dry.
     *
     * Returns true only when the opposite sub-queue became the current one, meaning the
     * caller has to reverse its service direction. Opposite requests take priority over
     * missed ones; when both are pending, the missed requests (which point in the old
     * direction) become the new opposite sub-queue. Promoting missed requests alone keeps
     * the direction and returns false.
     */
    pub fn swap_queues(&mut self) -> bool {
        if !self.current.is_empty() {
            return false;
        }

        if !self.opposite.is_empty() {
            self.current = std::mem::take(&mut self.opposite);
            self.opposite = std::mem::take(&mut self.missed);
            self.direction = self.direction.opposite();
            return true;
        }

        if !self.missed.is_empty() {
            self.current = std::mem::take(&mut self.missed);
        }
        false
    }

    /// Drops every pending request.
    pub fn clear(&mut self) -> usize {
        let dropped = self.len();
        self.current.clear();
        self.opposite.clear();
        self.missed.clear();
        dropped
    }

    /// Estimated time to serve every queued stop, walking them in service order
    /// from `current_floor`.
    pub fn get_expected_time(
        &self,
        current_floor: u8,
        door_overhead_per_stop: Duration,
        travel_time_per_floor: Duration,
    ) -> Duration {
        let mut position = current_floor;
        let mut total = Duration::ZERO;

        for floor in self.service_order() {
            let floors = position.abs_diff(floor) as u32;
            total += travel_time_per_floor * floors + door_overhead_per_stop;
            position = floor;
        }
        total
    }

    // Floors in the order they would be served if no new requests arrived
    fn service_order(&self) -> Vec<u8> {
        let mut order = self.current_floors();
        order.extend(self.opposite_floors());
        order.extend(self.missed_floors());
        order
    }

    fn ordered(queue: &BTreeMap<u8, StopRequest>, direction: Direction) -> Vec<u8> {
        match direction {
            Direction::Down => queue.keys().rev().copied().collect(),
            _ => queue.keys().copied().collect(),
        }
    }

    fn head_floor(queue: &BTreeMap<u8, StopRequest>, direction: Direction) -> Option<u8> {
        match direction {
            Direction::Down => queue.keys().next_back().copied(),
            _ => queue.keys().next().copied(),
        }
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        RequestQueue::new()
    }
}

impl fmt::Display for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |floors: Vec<u8>| {
            floors
                .iter()
                .map(|floor| floor.to_string())
                .collect::<Vec<String>>()
                .join(", ")
        };
        write!(
            f,
            "current [{}] opposite [{}] missed [{}]",
            join(self.current_floors()),
            join(self.opposite_floors()),
            join(self.missed_floors()),
        )
    }
}
