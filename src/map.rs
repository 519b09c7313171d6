use anyhow::{anyhow, bail, Context};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone)]
pub struct Tile {
    passable: bool,
    pub neighbors: Vec<(usize, usize)>, // Accessible neighbors, the tile itself included
}

impl Tile {
    pub fn is_passable(&self) -> bool {
        self.passable
    }
}

#[derive(Debug, Clone)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    pub grid: Vec<Vec<Tile>>,
}

impl Map {
    /// Loads a MovingAI `.map` file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("cannot read map {path}"))?;
        Self::parse(&content).with_context(|| format!("malformed map {path}"))
    }

    /// Parses the MovingAI format: `type`, `height`, `width`, `map`, then rows.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut lines = content.lines();

        let _type = lines.next().ok_or_else(|| anyhow!("missing type line"))?;
        let mut header_value = |name: &str| -> anyhow::Result<usize> {
            let line = lines
                .next()
                .ok_or_else(|| anyhow!("missing {name} line"))?;
            line.split_whitespace()
                .last()
                .ok_or_else(|| anyhow!("empty {name} line"))?
                .parse::<usize>()
                .with_context(|| format!("invalid {name}: {line}"))
        };
        let height = header_value("height")?;
        let width = header_value("width")?;
        let _map = lines.next().ok_or_else(|| anyhow!("missing map line"))?;

        let rows: Vec<&str> = lines.take(height).collect();
        if rows.len() != height {
            bail!("expected {height} rows, found {}", rows.len());
        }
        let map = Self::from_grid_rows(&rows)?;
        if map.width != width {
            bail!("expected width {width}, found {}", map.width);
        }
        Ok(map)
    }

    /// Builds a map from raw grid rows, `.` marking passable cells.
    pub fn from_grid_rows(rows: &[&str]) -> anyhow::Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.chars().count());

        let mut grid = Vec::with_capacity(height);
        for (x, row) in rows.iter().enumerate() {
            let tiles_row: Vec<Tile> = row
                .chars()
                .map(|ch| Tile {
                    passable: ch == '.',
                    neighbors: Vec::new(),
                })
                .collect();
            if tiles_row.len() != width {
                bail!("row {x} has {} cells, expected {width}", tiles_row.len());
            }
            grid.push(tiles_row);
        }

        let mut map = Map {
            height,
            width,
            grid,
        };
        map.initialize_neighbors();
        Ok(map)
    }

    fn initialize_neighbors(&mut self) {
        for x in 0..self.height {
            for y in 0..self.width {
                if self.grid[x][y].passable {
                    self.grid[x][y].neighbors = self.compute_neighbors(x, y);
                }
            }
        }
    }

    fn compute_neighbors(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let directions = [(-1, 0), (1, 0), (0, -1), (0, 1), (0, 0)]; // Up, down, left, right, stay
        let mut neighbors = Vec::new();

        for &(dx, dy) in &directions {
            let new_x = x as i64 + dx;
            let new_y = y as i64 + dy;
            if new_x >= 0
                && new_y >= 0
                && new_x < self.height as i64
                && new_y < self.width as i64
                && self.grid[new_x as usize][new_y as usize].passable
            {
                neighbors.push((new_x as usize, new_y as usize));
            }
        }

        neighbors
    }

    /// Cells reachable in one step from `(x, y)`, waiting in place included.
    /// Empty for obstacles and cells outside the map.
    pub fn get_neighbors(&self, x: usize, y: usize) -> &[(usize, usize)] {
        self.grid
            .get(x)
            .and_then(|row| row.get(y))
            .map(|tile| tile.neighbors.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_passable(&self, x: usize, y: usize) -> bool {
        self.grid
            .get(x)
            .and_then(|row| row.get(y))
            .is_some_and(Tile::is_passable)
    }

    /// Exact distance to `goal` from every cell, `usize::MAX` where unreachable.
    pub fn heuristic_dji(&self, goal: (usize, usize)) -> Vec<Vec<usize>> {
        let mut heuristic = vec![vec![usize::MAX; self.width]; self.height];
        if !self.is_passable(goal.0, goal.1) {
            return heuristic;
        }
        let mut heap = BinaryHeap::new();

        heuristic[goal.0][goal.1] = 0;
        heap.push((Reverse(0), goal));

        while let Some((Reverse(cost), (x, y))) = heap.pop() {
            if cost > heuristic[x][y] {
                continue;
            }

            for &(new_x, new_y) in &self.grid[x][y].neighbors {
                let next_cost = cost + 1;
                if next_cost < heuristic[new_x][new_y] {
                    heap.push((Reverse(next_cost), (new_x, new_y)));
                    heuristic[new_x][new_y] = next_cost;
                }
            }
        }

        heuristic
    }
}
