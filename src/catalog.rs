use std::collections::BTreeMap;

use crate::models::{MasteryTime, StudyPath, TopicId, TopicNode};

/// Static description of the course: modules, prerequisite edges, curated
/// paths and per-topic time estimates. Read-only once built.
#[derive(Debug, Clone)]
pub struct Curriculum {
    pub modules: Vec<TopicNode>,
    pub dependencies: BTreeMap<TopicId, Vec<TopicId>>,
    pub paths: Vec<StudyPath>,
    pub exam_weight: BTreeMap<TopicId, u32>,
    pub mastery_time: BTreeMap<TopicId, MasteryTime>,
}

pub const DEFAULT_PATH: &str = "comprehensive";

fn ids(topics: &[&str]) -> Vec<TopicId> {
    topics.iter().map(|t| t.to_string()).collect()
}

fn module(
    module_number: u32,
    title: &str,
    description: &str,
    topics: &[&str],
    estimated_minutes: Option<u32>,
) -> TopicNode {
    TopicNode {
        module_number,
        title: title.to_string(),
        description: description.to_string(),
        topics: ids(topics),
        estimated_minutes,
    }
}

fn path(key: &str, name: &str, description: &str, sequence: &[&str]) -> StudyPath {
    StudyPath {
        key: key.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        sequence: ids(sequence),
    }
}

impl Curriculum {
    /// The advanced data structures course this tool ships with.
    pub fn builtin() -> Self {
        #[rustfmt::skip]
        let modules = vec![
            module(1, "Course Foundations", "Prerequisites and complexity analysis basics", &[], None),
            module(2, "Amortized Complexity Analysis", "Aggregate, accounting, and potential methods", &["amortized"], Some(45)),
            module(3, "External Memory & Cache Algorithms", "Memory hierarchy, I/O complexity, cache optimization", &["cacheOptimization"], Some(45)),
            module(4, "External Sorting", "Run generation, k-way merging, I/O efficient sorting", &["externalSorting"], Some(50)),
            module(5, "Tournament Trees", "Winner trees, loser trees, k-way merge applications", &["tournamentTrees"], Some(40)),
            module(6, "Huffman Trees & Compression", "Optimal merging, prefix codes, entropy bounds", &["huffmanTrees"], Some(35)),
            module(7, "Double-Ended Priority Queues", "Interval heaps, min-max heaps, deaps, DEPQ structures", &["intervalHeaps", "minMaxHeaps", "deaps"], Some(85)),
            module(8, "Meldable Heaps", "Leftist trees, skew heaps, efficient melding", &["leftistTrees"], Some(35)),
            module(9, "Advanced Heap Structures", "Binomial heaps, Fibonacci heaps, lazy operations", &["binomialHeaps", "fibonacciHeaps"], Some(95)),
            module(10, "Bin Packing Algorithms", "Online/offline algorithms, approximation bounds", &["binPacking"], Some(40)),
            module(11, "Expression Processing", "Expression trees, parsing algorithms, notation conversion", &["expressionTrees"], Some(35)),
            module(12, "Self-Adjusting Structures", "Splay trees, adaptive data structures", &["splayTrees"], Some(35)),
            module(13, "Parallel & Advanced Topics", "Lock-free algorithms, concurrent data structures", &["parallelAlgorithms"], Some(40)),
        ];

        let edges: &[(&str, &[&str])] = &[
            ("amortized", &[]),
            ("cacheOptimization", &[]),
            ("externalSorting", &["cacheOptimization"]),
            ("tournamentTrees", &["externalSorting"]),
            ("huffmanTrees", &[]),
            ("intervalHeaps", &[]),
            ("minMaxHeaps", &["intervalHeaps"]),
            ("deaps", &["intervalHeaps"]),
            ("leftistTrees", &[]),
            ("binomialHeaps", &["leftistTrees"]),
            ("fibonacciHeaps", &["binomialHeaps", "amortized"]),
            ("binPacking", &[]),
            ("expressionTrees", &[]),
            ("splayTrees", &["amortized"]),
            ("parallelAlgorithms", &[]),
        ];
        let dependencies = edges
            .iter()
            .map(|(topic, prereqs)| (topic.to_string(), ids(prereqs)))
            .collect();

        let paths = vec![
            path(
                "comprehensive",
                "Complete Course",
                "Follow the course module order",
                &[
                    "amortized",
                    "cacheOptimization",
                    "externalSorting",
                    "tournamentTrees",
                    "huffmanTrees",
                    "intervalHeaps",
                    "minMaxHeaps",
                    "deaps",
                    "leftistTrees",
                    "binomialHeaps",
                    "fibonacciHeaps",
                    "binPacking",
                    "expressionTrees",
                    "splayTrees",
                    "parallelAlgorithms",
                ],
            ),
            path(
                "priorityQueues",
                "Priority Queue Focus",
                "Deep dive into heap structures",
                &[
                    "intervalHeaps",
                    "minMaxHeaps",
                    "deaps",
                    "leftistTrees",
                    "binomialHeaps",
                    "fibonacciHeaps",
                    "tournamentTrees",
                ],
            ),
            path(
                "externalAlgorithms",
                "External Memory Focus",
                "I/O efficient algorithms",
                &["cacheOptimization", "externalSorting", "tournamentTrees", "huffmanTrees"],
            ),
            path(
                "examPrep",
                "Exam Preparation",
                "High-priority topics for exams",
                &[
                    "amortized",
                    "intervalHeaps",
                    "leftistTrees",
                    "binomialHeaps",
                    "externalSorting",
                    "tournamentTrees",
                    "huffmanTrees",
                    "fibonacciHeaps",
                ],
            ),
        ];

        let exam_weight = [
            ("amortized", 15),
            ("externalSorting", 12),
            ("intervalHeaps", 10),
            ("leftistTrees", 8),
            ("binomialHeaps", 8),
            ("fibonacciHeaps", 7),
            ("tournamentTrees", 8),
            ("huffmanTrees", 7),
            ("cacheOptimization", 8),
            ("minMaxHeaps", 5),
            ("deaps", 4),
            ("binPacking", 5),
            ("expressionTrees", 3),
            ("splayTrees", 5),
            ("parallelAlgorithms", 5),
        ]
        .into_iter()
        .map(|(topic, weight)| (topic.to_string(), weight))
        .collect();

        let mastery_time = [
            ("amortized", 45, 120),
            ("cacheOptimization", 45, 90),
            ("externalSorting", 50, 100),
            ("tournamentTrees", 40, 80),
            ("huffmanTrees", 35, 70),
            ("intervalHeaps", 40, 80),
            ("minMaxHeaps", 30, 60),
            ("deaps", 25, 50),
            ("leftistTrees", 35, 90),
            ("binomialHeaps", 45, 100),
            ("fibonacciHeaps", 50, 120),
            ("binPacking", 40, 80),
            ("expressionTrees", 35, 60),
            ("splayTrees", 35, 70),
            ("parallelAlgorithms", 40, 60),
        ]
        .into_iter()
        .map(|(topic, reading, practice)| {
            (
                topic.to_string(),
                MasteryTime {
                    reading,
                    practice,
                    total: reading + practice,
                },
            )
        })
        .collect();

        Self {
            modules,
            dependencies,
            paths,
            exam_weight,
            mastery_time,
        }
    }

    pub fn path(&self, key: &str) -> Option<&StudyPath> {
        self.paths.iter().find(|p| p.key == key)
    }

    pub fn prerequisites(&self, topic: &str) -> &[TopicId] {
        self.dependencies
            .get(topic)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every topic that appears in some module, in module order.
    pub fn topics(&self) -> impl Iterator<Item = &TopicId> {
        self.modules.iter().flat_map(|m| m.topics.iter())
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.topics().any(|t| t == topic)
    }

    pub fn exam_weight(&self, topic: &str) -> Option<u32> {
        self.exam_weight.get(topic).copied()
    }

    pub fn mastery_time(&self, topic: &str) -> Option<MasteryTime> {
        self.mastery_time.get(topic).copied()
    }
}
