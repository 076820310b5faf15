use std::f32::consts::SQRT_2;

use engine::Vec2;

pub(crate) const MAX_PATH_ITERATIONS: u32 = 800;
const LINE_OF_SIGHT_SAMPLES_PER_TILE: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TileCoord {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl TileCoord {
    pub(crate) const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub(crate) fn from_world(position: Vec2) -> Self {
        Self {
            x: position.x.round() as i32,
            y: position.y.round() as i32,
        }
    }

    pub(crate) fn to_world(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }
}

const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Grid A* over a caller-supplied passability predicate. Holds no per-search
/// state, so one instance serves every query against a map.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pathfinder {
    width: i32,
    height: i32,
    max_iterations: u32,
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    coord: TileCoord,
    f_cost: f32,
    insertion_order: u64,
}

impl Pathfinder {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
            max_iterations: MAX_PATH_ITERATIONS,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub(crate) fn in_bounds(&self, coord: TileCoord) -> bool {
        coord.x >= 0 && coord.y >= 0 && coord.x < self.width && coord.y < self.height
    }

    fn index_of(&self, coord: TileCoord) -> usize {
        coord.y as usize * self.width as usize + coord.x as usize
    }

    /// Tile route from `start` to `goal`, both inclusive. `None` when the goal
    /// is out of bounds or blocked, the start is out of bounds, nothing
    /// connects them, or the iteration budget runs out.
    pub(crate) fn find_path(
        &self,
        start: TileCoord,
        goal: TileCoord,
        is_blocked: impl Fn(i32, i32) -> bool,
    ) -> Option<Vec<TileCoord>> {
        if !self.in_bounds(goal) || is_blocked(goal.x, goal.y) || !self.in_bounds(start) {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        let node_count = (self.width * self.height) as usize;
        let mut closed = vec![false; node_count];
        let mut best_g = vec![f32::INFINITY; node_count];
        let mut parent = vec![None::<usize>; node_count];
        let mut open = Vec::<OpenNode>::new();
        let mut next_insertion = 0u64;

        let start_index = self.index_of(start);
        best_g[start_index] = 0.0;
        open.push(OpenNode {
            coord: start,
            f_cost: octile_distance(start, goal),
            insertion_order: next_insertion,
        });
        next_insertion += 1;

        let mut iterations = 0u32;
        while !open.is_empty() && iterations < self.max_iterations {
            iterations += 1;
            let best_index = pick_best_open_node_index(&open);
            let current = open.remove(best_index);
            let current_index = self.index_of(current.coord);
            if closed[current_index] {
                continue;
            }
            closed[current_index] = true;

            if current.coord == goal {
                return Some(self.reconstruct_tile_path(&parent, start_index, current_index));
            }

            let current_g = best_g[current_index];
            for (dx, dy) in NEIGHBOR_OFFSETS {
                let neighbor = TileCoord::new(current.coord.x + dx, current.coord.y + dy);
                if !self.in_bounds(neighbor) || is_blocked(neighbor.x, neighbor.y) {
                    continue;
                }
                let diagonal = dx != 0 && dy != 0;
                if diagonal
                    && (is_blocked(current.coord.x + dx, current.coord.y)
                        || is_blocked(current.coord.x, current.coord.y + dy))
                {
                    continue;
                }
                let neighbor_index = self.index_of(neighbor);
                if closed[neighbor_index] {
                    continue;
                }

                let step_cost = if diagonal { SQRT_2 } else { 1.0 };
                let tentative_g = current_g + step_cost;
                if tentative_g >= best_g[neighbor_index] {
                    continue;
                }
                best_g[neighbor_index] = tentative_g;
                parent[neighbor_index] = Some(current_index);
                open.push(OpenNode {
                    coord: neighbor,
                    f_cost: tentative_g + octile_distance(neighbor, goal),
                    insertion_order: next_insertion,
                });
                next_insertion += 1;
            }
        }

        None
    }

    fn reconstruct_tile_path(
        &self,
        parent: &[Option<usize>],
        start_index: usize,
        goal_index: usize,
    ) -> Vec<TileCoord> {
        let width = self.width as usize;
        let mut cursor = goal_index;
        let mut indices = vec![cursor];
        while cursor != start_index {
            let Some(next) = parent.get(cursor).copied().flatten() else {
                break;
            };
            cursor = next;
            indices.push(cursor);
        }
        indices.reverse();
        indices
            .into_iter()
            .map(|index| TileCoord::new((index % width) as i32, (index / width) as i32))
            .collect()
    }
}

/// Lowest f-cost wins; equal costs go to the earliest discovered node.
fn pick_best_open_node_index(open: &[OpenNode]) -> usize {
    let mut best_index = 0usize;
    for index in 1..open.len() {
        let current = open[index];
        let best = open[best_index];
        if (current.f_cost, current.insertion_order) < (best.f_cost, best.insertion_order) {
            best_index = index;
        }
    }
    best_index
}

pub(crate) fn octile_distance(a: TileCoord, b: TileCoord) -> f32 {
    let dx = a.x.abs_diff(b.x) as f32;
    let dy = a.y.abs_diff(b.y) as f32;
    dx.max(dy) + (SQRT_2 - 1.0) * dx.min(dy)
}

/// Straight segment test sampled at six points per tile of length (at least
/// two), each sample checked by its rounded tile. A diagonal hop between
/// consecutive samples also needs both side tiles open, matching the
/// pathfinder's corner rule.
pub(crate) fn has_line_of_sight(from: Vec2, to: Vec2, is_blocked: impl Fn(i32, i32) -> bool) -> bool {
    let samples = ((from.distance(to) * LINE_OF_SIGHT_SAMPLES_PER_TILE).ceil() as u32).max(2);
    let mut previous: Option<TileCoord> = None;
    for step in 0..=samples {
        let t = step as f32 / samples as f32;
        let tile = TileCoord::from_world(Vec2::new(
            from.x + (to.x - from.x) * t,
            from.y + (to.y - from.y) * t,
        ));
        if is_blocked(tile.x, tile.y) {
            return false;
        }
        if let Some(prev) = previous {
            let diagonal = prev.x != tile.x && prev.y != tile.y;
            if diagonal && (is_blocked(tile.x, prev.y) || is_blocked(prev.x, tile.y)) {
                return false;
            }
        }
        previous = Some(tile);
    }
    true
}

/// String-pull pass: from each kept point, jump to the farthest later point
/// still in line of sight. Endpoints are always kept.
pub(crate) fn smooth_path(path: &[Vec2], is_blocked: impl Fn(i32, i32) -> bool) -> Vec<Vec2> {
    if path.len() <= 2 {
        return path.to_vec();
    }
    let last = path.len() - 1;
    let mut smoothed = vec![path[0]];
    let mut anchor = 0usize;
    while anchor < last {
        let mut reach = last;
        while reach > anchor + 1 && !has_line_of_sight(path[anchor], path[reach], &is_blocked) {
            reach -= 1;
        }
        smoothed.push(path[reach]);
        anchor = reach;
    }
    smoothed
}

#[cfg(test)]
mod nav_tests {
    use super::*;

    struct Grid {
        width: usize,
        height: usize,
        blocked: Vec<bool>,
    }

    impl Grid {
        fn open(width: usize, height: usize) -> Self {
            Self {
                width,
                height,
                blocked: vec![false; width * height],
            }
        }

        fn block(&mut self, x: i32, y: i32) {
            self.blocked[y as usize * self.width + x as usize] = true;
        }

        fn is_blocked(&self, x: i32, y: i32) -> bool {
            if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
                return true;
            }
            self.blocked[y as usize * self.width + x as usize]
        }

        fn pathfinder(&self) -> Pathfinder {
            Pathfinder::new(self.width, self.height)
        }

        fn find(&self, start: (i32, i32), goal: (i32, i32)) -> Option<Vec<TileCoord>> {
            self.pathfinder().find_path(
                TileCoord::new(start.0, start.1),
                TileCoord::new(goal.0, goal.1),
                |x, y| self.is_blocked(x, y),
            )
        }
    }

    fn path_cost(path: &[TileCoord]) -> f32 {
        path.windows(2)
            .map(|pair| {
                let diagonal = pair[0].x != pair[1].x && pair[0].y != pair[1].y;
                if diagonal {
                    SQRT_2
                } else {
                    1.0
                }
            })
            .sum()
    }

    #[test]
    fn open_grid_path_is_octile_optimal() {
        let grid = Grid::open(8, 8);
        let path = grid.find((0, 0), (5, 5)).expect("path");
        assert_eq!(path.first(), Some(&TileCoord::new(0, 0)));
        assert_eq!(path.last(), Some(&TileCoord::new(5, 5)));
        let expected = octile_distance(TileCoord::new(0, 0), TileCoord::new(5, 5));
        assert!((path_cost(&path) - expected).abs() < 1e-4);

        let uneven = grid.find((0, 0), (6, 2)).expect("path");
        let expected = octile_distance(TileCoord::new(0, 0), TileCoord::new(6, 2));
        assert!((path_cost(&uneven) - expected).abs() < 1e-4);
    }

    #[test]
    fn diagonal_wall_is_never_corner_cut() {
        let mut grid = Grid::open(7, 7);
        for i in 0..6 {
            grid.block(i + 1, 5 - i);
        }
        let path = grid.find((0, 0), (6, 6)).expect("path around wall");
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(!grid.is_blocked(b.x, b.y));
            if a.x != b.x && a.y != b.y {
                assert!(
                    !grid.is_blocked(b.x, a.y) && !grid.is_blocked(a.x, b.y),
                    "corner cut between {a:?} and {b:?}"
                );
            }
        }
    }

    #[test]
    fn fully_sealed_diagonal_wall_has_no_path() {
        let mut grid = Grid::open(6, 6);
        for i in 0..6 {
            grid.block(i, 5 - i);
        }
        assert!(grid.find((0, 0), (5, 5)).is_none());
    }

    #[test]
    fn goal_out_of_bounds_or_blocked_returns_none() {
        let mut grid = Grid::open(4, 4);
        grid.block(3, 3);
        assert!(grid.find((0, 0), (4, 0)).is_none());
        assert!(grid.find((0, 0), (-1, 2)).is_none());
        assert!(grid.find((0, 0), (3, 3)).is_none());
        assert!(grid.find((9, 9), (1, 1)).is_none());
    }

    #[test]
    fn start_equal_goal_is_single_tile() {
        let grid = Grid::open(3, 3);
        assert_eq!(grid.find((1, 1), (1, 1)), Some(vec![TileCoord::new(1, 1)]));
    }

    #[test]
    fn iteration_budget_is_a_soft_failure() {
        let grid = Grid::open(40, 40);
        let tight = grid.pathfinder().with_max_iterations(5).find_path(
            TileCoord::new(0, 0),
            TileCoord::new(39, 39),
            |x, y| grid.is_blocked(x, y),
        );
        assert!(tight.is_none());
        assert!(grid.find((0, 0), (39, 39)).is_some());
    }

    #[test]
    fn tie_break_is_deterministic() {
        let mut grid = Grid::open(5, 5);
        grid.block(2, 2);
        assert_eq!(grid.find((0, 2), (4, 2)), grid.find((0, 2), (4, 2)));
    }

    #[test]
    fn line_of_sight_detects_blocked_tile() {
        let mut grid = Grid::open(5, 5);
        grid.block(2, 0);
        let blocked = |x, y| grid.is_blocked(x, y);
        assert!(!has_line_of_sight(Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0), blocked));
        assert!(has_line_of_sight(Vec2::new(0.0, 1.0), Vec2::new(4.0, 1.0), blocked));
    }

    #[test]
    fn smoothing_drops_staircase_points_and_keeps_endpoints() {
        let grid = Grid::open(6, 6);
        let path = grid
            .find((0, 0), (5, 2))
            .expect("path")
            .into_iter()
            .map(TileCoord::to_world)
            .collect::<Vec<_>>();
        assert!(path.len() > 2);
        let smoothed = smooth_path(&path, |x, y| grid.is_blocked(x, y));
        assert_eq!(smoothed, vec![Vec2::new(0.0, 0.0), Vec2::new(5.0, 2.0)]);
    }

    #[test]
    fn smoothing_keeps_corner_around_obstacle() {
        let mut grid = Grid::open(5, 5);
        grid.block(1, 0);
        grid.block(1, 1);
        let path = grid
            .find((0, 0), (2, 0))
            .expect("path")
            .into_iter()
            .map(TileCoord::to_world)
            .collect::<Vec<_>>();
        let smoothed = smooth_path(&path, |x, y| grid.is_blocked(x, y));
        assert_eq!(smoothed.first(), Some(&Vec2::new(0.0, 0.0)));
        assert_eq!(smoothed.last(), Some(&Vec2::new(2.0, 0.0)));
        assert!(smoothed.len() >= 3);
        for pair in smoothed.windows(2) {
            assert!(has_line_of_sight(pair[0], pair[1], |x, y| grid.is_blocked(x, y)));
        }
    }

    #[test]
    fn line_of_sight_rejects_squeeze_between_diagonal_blocks() {
        let mut grid = Grid::open(4, 4);
        grid.block(2, 1);
        grid.block(1, 2);
        let blocked = |x, y| grid.is_blocked(x, y);
        assert!(!has_line_of_sight(Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0), blocked));

        let path = grid
            .find((1, 1), (2, 2))
            .expect("detour")
            .into_iter()
            .map(TileCoord::to_world)
            .collect::<Vec<_>>();
        assert!(path.len() > 2);
        let smoothed = smooth_path(&path, blocked);
        assert!(smoothed.len() > 2);
        for pair in smoothed.windows(2) {
            assert!(
                has_line_of_sight(pair[0], pair[1], blocked),
                "segment {:?} -> {:?} cuts a corner",
                pair[0],
                pair[1]
            );
        }
    }
}
