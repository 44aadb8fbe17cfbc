//! Lays out a commit history as text graph rows in the style of
//! `git log --graph`.
//!
//! Each commit gets a lane; a merge opens one extra lane per additional parent
//! and lanes waiting for the same commit collapse into one when it is reached.

use std::collections::HashMap;

/// Orders the commits reachable from `tip` so every commit comes before its
/// parents. First parents are followed before the other parents of a merge.
pub fn topo_order(tip: &str, parents: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut children: HashMap<&str, usize> = HashMap::new();
    for commit_parents in parents.values() {
        for parent in commit_parents {
            *children.entry(parent.as_str()).or_default() += 1;
        }
    }

    let mut order = Vec::with_capacity(parents.len());
    let mut ready = vec![tip];
    while let Some(id) = ready.pop() {
        order.push(id.to_owned());
        let Some(commit_parents) = parents.get(id) else {
            continue;
        };
        for parent in commit_parents.iter().rev() {
            let Some(remaining) = children.get_mut(parent.as_str()) else {
                continue;
            };
            *remaining -= 1;
            if *remaining == 0 {
                ready.push(parent.as_str());
            }
        }
    }
    order
}

struct Row(Vec<char>);

impl Row {
    fn new(lanes: usize) -> Self {
        Row(vec![' '; lanes * 2])
    }

    fn put(&mut self, column: usize, glyph: char) {
        if column >= self.0.len() {
            self.0.resize(column + 1, ' ');
        }
        self.0[column] = glyph;
    }

    fn finish(self) -> String {
        let row: String = self.0.into_iter().collect();
        row.trim_end().to_owned()
    }
}

/// Draws one row per commit in `order`, with `|\` rows after merges and `|/`
/// rows where lanes join.
pub fn draw(order: &[String], parents: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut lanes: Vec<Option<&str>> = Vec::new();
    let mut rows = Vec::new();
    for id in order {
        let waiting: Vec<usize> = lanes
            .iter()
            .enumerate()
            .filter(|(_, lane)| **lane == Some(id.as_str()))
            .map(|(i, _)| i)
            .collect();
        let column = match waiting.first() {
            Some(&column) => column,
            None => match lanes.iter().position(Option::is_none) {
                Some(free) => {
                    lanes[free] = Some(id.as_str());
                    free
                }
                None => {
                    lanes.push(Some(id.as_str()));
                    lanes.len() - 1
                }
            },
        };

        if waiting.len() > 1 {
            let mut row = Row::new(lanes.len());
            for (i, lane) in lanes.iter().enumerate() {
                if waiting[1..].contains(&i) {
                    row.put(2 * i - 1, '/');
                } else if lane.is_some() {
                    row.put(2 * i, '|');
                }
            }
            rows.push(row.finish());
            for &i in &waiting[1..] {
                lanes[i] = None;
            }
        }

        let mut row = Row::new(lanes.len());
        for (i, lane) in lanes.iter().enumerate() {
            if i == column {
                row.put(2 * i, '*');
            } else if lane.is_some() {
                row.put(2 * i, '|');
            }
        }
        rows.push(format!("{} {}", row.finish(), id));

        let commit_parents = parents.get(id).map(Vec::as_slice).unwrap_or_default();
        lanes[column] = commit_parents.first().map(String::as_str);
        if commit_parents.len() > 1 {
            for (offset, parent) in commit_parents[1..].iter().enumerate() {
                lanes.insert(column + 1 + offset, Some(parent.as_str()));
            }
            let mut row = Row::new(lanes.len());
            for (i, lane) in lanes.iter().enumerate() {
                if lane.is_none() {
                    continue;
                }
                if i <= column {
                    row.put(2 * i, '|');
                } else {
                    row.put(2 * i - 1, '\\');
                }
            }
            rows.push(row.finish());
        }

        while lanes.last() == Some(&None) {
            lanes.pop();
        }
    }
    rows
}
