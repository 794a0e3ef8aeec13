//! Prerequisite resolution.
//!
//! Prerequisites form a directed graph of `course -> prerequisite` edges. A
//! resolver walks every course reachable from a program and groups them into
//! levels so that each course appears after everything it depends on.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use deadpool_postgres::Pool;
use waypoint_core::{PrerequisiteSkeleton, StorageError};

/// Upper bound on prerequisite chain length followed from a program.
pub const MAX_PREREQUISITE_DEPTH: i32 = 16;

/// Source of prerequisite skeletons for curriculum synthesis.
#[async_trait]
pub trait PrerequisiteResolver: Send + Sync {
    async fn resolve_prerequisites(
        &self,
        program: &str,
    ) -> Result<PrerequisiteSkeleton, StorageError>;
}

/// Group the courses reachable from `program` into dependency levels.
///
/// Level 0 holds courses with no prerequisites of their own. Courses caught
/// in a cycle are placed together in a final level. Names inside a level are
/// sorted.
pub fn layer_prerequisites(
    program: &str,
    edges: &HashMap<String, Vec<String>>,
) -> PrerequisiteSkeleton {
    // Reachable courses, excluding the program itself.
    let mut reachable: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([program]);
    let mut visited: HashSet<&str> = HashSet::from([program]);
    let mut depth: HashMap<&str, i32> = HashMap::from([(program, 0)]);
    while let Some(course) = queue.pop_front() {
        let course_depth = depth.get(course).copied().unwrap_or(0);
        if course_depth >= MAX_PREREQUISITE_DEPTH {
            continue;
        }
        for prereq in edges.get(course).into_iter().flatten() {
            if prereq != program {
                reachable.insert(prereq.clone());
            }
            if visited.insert(prereq.as_str()) {
                depth.insert(prereq.as_str(), course_depth + 1);
                queue.push_back(prereq.as_str());
            }
        }
    }

    // Remaining prerequisite count per reachable course.
    let mut remaining: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for course in &reachable {
        let prereqs: BTreeSet<&str> = edges
            .get(course)
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(|p| reachable.contains(*p))
            .collect();
        remaining.insert(course.as_str(), prereqs.len());
        for prereq in prereqs {
            dependents.entry(prereq).or_default().push(course.as_str());
        }
    }

    let mut levels: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<&str> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(course, _)| *course)
        .collect();

    while !current.is_empty() {
        let mut next: BTreeSet<&str> = BTreeSet::new();
        for course in &current {
            remaining.remove(course);
            for dependent in dependents.get(course).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        next.insert(*dependent);
                    }
                }
            }
        }
        levels.push(current.iter().map(|c| c.to_string()).collect());
        current = next.into_iter().collect();
    }

    if !remaining.is_empty() {
        tracing::warn!(
            program = %program,
            courses = remaining.len(),
            "Prerequisite cycle detected, grouping cyclic courses into a final level"
        );
        levels.push(remaining.keys().map(|c| c.to_string()).collect());
    }

    PrerequisiteSkeleton {
        program: program.to_string(),
        levels,
    }
}

// ============================================================================
// IN-MEMORY GRAPH
// ============================================================================

/// Prerequisite graph held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPrerequisiteGraph {
    edges: HashMap<String, Vec<String>>,
}

impl InMemoryPrerequisiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `course` requires `prerequisite`.
    pub fn add_prerequisite(&mut self, course: impl Into<String>, prerequisite: impl Into<String>) {
        let prerequisites = self.edges.entry(course.into()).or_default();
        let prerequisite = prerequisite.into();
        if !prerequisites.contains(&prerequisite) {
            prerequisites.push(prerequisite);
        }
    }

    /// Builder form of [`add_prerequisite`](Self::add_prerequisite).
    pub fn with_prerequisite(
        mut self,
        course: impl Into<String>,
        prerequisite: impl Into<String>,
    ) -> Self {
        self.add_prerequisite(course, prerequisite);
        self
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl PrerequisiteResolver for InMemoryPrerequisiteGraph {
    async fn resolve_prerequisites(
        &self,
        program: &str,
    ) -> Result<PrerequisiteSkeleton, StorageError> {
        Ok(layer_prerequisites(program, &self.edges))
    }
}

// ============================================================================
// POSTGRES GRAPH
// ============================================================================

const PREREQUISITE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS program_prerequisites (
    program_name TEXT NOT NULL,
    prerequisite TEXT NOT NULL,
    PRIMARY KEY (program_name, prerequisite)
);
CREATE INDEX IF NOT EXISTS idx_program_prerequisites_prerequisite
    ON program_prerequisites (prerequisite);
"#;

/// Prerequisite resolver reading the `program_prerequisites` edge table.
#[derive(Clone)]
pub struct PostgresPrerequisiteResolver {
    pool: Pool,
}

impl PostgresPrerequisiteResolver {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create the edge table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        let conn = self.pool.get().await.map_err(StorageError::unavailable)?;
        conn.batch_execute(PREREQUISITE_SCHEMA)
            .await
            .map_err(|e| StorageError::GraphQueryFailed {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl PrerequisiteResolver for PostgresPrerequisiteResolver {
    async fn resolve_prerequisites(
        &self,
        program: &str,
    ) -> Result<PrerequisiteSkeleton, StorageError> {
        let conn = self.pool.get().await.map_err(StorageError::unavailable)?;
        let rows = conn
            .query(
                "WITH RECURSIVE reach(course, prerequisite, depth) AS (
                     SELECT program_name, prerequisite, 1
                     FROM program_prerequisites
                     WHERE program_name = $1
                   UNION
                     SELECT p.program_name, p.prerequisite, r.depth + 1
                     FROM program_prerequisites p
                     JOIN reach r ON p.program_name = r.prerequisite
                     WHERE r.depth < $2
                 )
                 SELECT DISTINCT course, prerequisite FROM reach",
                &[&program, &MAX_PREREQUISITE_DEPTH],
            )
            .await
            .map_err(|e| StorageError::GraphQueryFailed {
                reason: e.to_string(),
            })?;

        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for row in &rows {
            let course: String = row.try_get(0).map_err(|e| StorageError::GraphQueryFailed {
                reason: e.to_string(),
            })?;
            let prerequisite: String =
                row.try_get(1).map_err(|e| StorageError::GraphQueryFailed {
                    reason: e.to_string(),
                })?;
            edges.entry(course).or_default().push(prerequisite);
        }

        Ok(layer_prerequisites(program, &edges))
    }
}
