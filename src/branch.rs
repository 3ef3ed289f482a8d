//! Branch grouping of generated tasks for hierarchical browsing.
//!
//! A task's branch is the option label of the first link of its resolved
//! chain. Tasks without any resolved parameter fall into a sentinel group.
//! Search filtering runs before grouping, so only groups that contain at least
//! one match survive and their counts reflect matches only.

use std::collections::{BTreeMap, BTreeSet};

use crate::task::GeneratedTaskView;

/// Group label for tasks whose chain is empty.
pub const UNCATEGORIZED_LABEL: &str = "Sin categoría";

/// Group `tasks` by branch label. Keys iterate in lexicographic order, tasks
/// keep their input order inside a group.
pub fn group_by_branch(tasks: Vec<GeneratedTaskView>) -> BTreeMap<String, Vec<GeneratedTaskView>> {
    group_by_branch_with(tasks, UNCATEGORIZED_LABEL)
}

/// [`group_by_branch`] with a caller-chosen sentinel label.
pub fn group_by_branch_with(tasks: Vec<GeneratedTaskView>, sentinel: &str) -> BTreeMap<String, Vec<GeneratedTaskView>> {
    let mut groups: BTreeMap<String, Vec<GeneratedTaskView>> = BTreeMap::new();
    for task in tasks {
        let key = task.branch_label().unwrap_or(sentinel).to_string();
        groups.entry(key).or_default().push(task);
    }
    groups
}

/// Case-insensitive substring match against branch, display name and every
/// resolved parameter label and option label. An empty query matches all.
pub fn matches_search(task: &GeneratedTaskView, query: &str) -> bool {
    matches_search_with(task, query, UNCATEGORIZED_LABEL)
}

/// [`matches_search`] where a task without a chain carries `sentinel` as its
/// branch label.
pub fn matches_search_with(task: &GeneratedTaskView, query: &str, sentinel: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let hit = |s: &str| s.to_lowercase().contains(&needle);

    hit(task.branch_label().unwrap_or(sentinel))
        || hit(&task.display_name)
        || task.code.as_deref().map_or(false, hit)
        || task.resolved.iter().any(|r| hit(&r.label) || hit(&r.option_label))
}

/// Keep the tasks matching `query`, preserving order.
pub fn filter_tasks(tasks: Vec<GeneratedTaskView>, query: &str) -> Vec<GeneratedTaskView> {
    filter_tasks_with(tasks, query, UNCATEGORIZED_LABEL)
}

/// [`filter_tasks`] with a caller-chosen sentinel label.
pub fn filter_tasks_with(tasks: Vec<GeneratedTaskView>, query: &str, sentinel: &str) -> Vec<GeneratedTaskView> {
    tasks.into_iter().filter(|t| matches_search_with(t, query, sentinel)).collect()
}

/// Filter by `query`, then group by branch.
pub fn search_and_group(
    tasks: Vec<GeneratedTaskView>,
    query: &str,
    sentinel: &str,
) -> BTreeMap<String, Vec<GeneratedTaskView>> {
    group_by_branch_with(filter_tasks_with(tasks, query, sentinel), sentinel)
}

/// A node of the multi-level branch tree. The path of a node is the sequence
/// of option labels leading to it.
#[derive(Debug, Clone, Default)]
pub struct BranchNode {
    pub label: String,
    pub children: BTreeMap<String, BranchNode>,
    /// Tasks whose chain ends exactly at this node.
    pub tasks: Vec<GeneratedTaskView>,
}

impl BranchNode {
    fn named(label: &str) -> Self {
        BranchNode { label: label.to_string(), ..Default::default() }
    }

    /// Number of tasks in this subtree.
    pub fn total(&self) -> usize {
        self.tasks.len() + self.children.values().map(BranchNode::total).sum::<usize>()
    }

    /// Node at `path` below this one.
    pub fn find(&self, path: &[String]) -> Option<&BranchNode> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self.children.get(head)?.find(rest),
        }
    }

    /// All tasks of this subtree, depth first.
    pub fn all_tasks(&self) -> Vec<&GeneratedTaskView> {
        let mut out: Vec<&GeneratedTaskView> = self.tasks.iter().collect();
        for child in self.children.values() {
            out.extend(child.all_tasks());
        }
        out
    }

    /// Flatten the tree for display. Children of a node are listed only when
    /// its path is in `expanded`.
    pub fn rows(&self, expanded: &BTreeSet<Vec<String>>) -> Vec<BranchRow> {
        let mut rows = Vec::new();
        let mut path = Vec::new();
        self.collect_rows(&mut path, expanded, &mut rows);
        rows
    }

    fn collect_rows(&self, path: &mut Vec<String>, expanded: &BTreeSet<Vec<String>>, rows: &mut Vec<BranchRow>) {
        for (label, child) in &self.children {
            path.push(label.clone());
            let is_expanded = expanded.contains(&*path);
            rows.push(BranchRow {
                path: path.clone(),
                label: label.clone(),
                depth: path.len() - 1,
                count: child.total(),
                has_children: !child.children.is_empty(),
                expanded: is_expanded,
            });
            if is_expanded {
                child.collect_rows(path, expanded, rows);
            }
            path.pop();
        }
    }
}

/// One visible line of a flattened branch tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRow {
    pub path: Vec<String>,
    pub label: String,
    pub depth: usize,
    pub count: usize,
    pub has_children: bool,
    pub expanded: bool,
}

/// Build a tree keyed by successive option labels of each task's chain.
pub fn build_branch_tree(tasks: Vec<GeneratedTaskView>, sentinel: &str) -> BranchNode {
    let mut root = BranchNode::named("");
    for task in tasks {
        let path: Vec<String> = if task.resolved.is_empty() {
            vec![sentinel.to_string()]
        } else {
            task.resolved.iter().map(|r| r.option_label.clone()).collect()
        };
        let mut node = &mut root;
        for label in &path {
            node = node
                .children
                .entry(label.clone())
                .or_insert_with(|| BranchNode::named(label));
        }
        node.tasks.push(task);
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolvedParam;
    use uuid::Uuid;

    fn link(slug: &str, label: &str, option_label: &str, position: i32) -> ResolvedParam {
        ResolvedParam {
            slug: slug.into(),
            label: label.to_string(),
            option_label: option_label.to_string(),
            position,
            expression_template: "{value}".to_string(),
            option_id: format!("o_{option_label}").as_str().into(),
            category_id: None,
            unit_id: None,
        }
    }

    fn view(n: u128, name: &str, chain: &[(&str, &str)]) -> GeneratedTaskView {
        GeneratedTaskView {
            id: Uuid::from_u128(n),
            code: Some(format!("MAM-{n:03}")),
            display_name: name.to_string(),
            unit: Some("m2".to_string()),
            category_name: Some("Mampostería".to_string()),
            resolved: chain
                .iter()
                .enumerate()
                .map(|(i, (label, value))| link(&format!("p{i}"), label, value, i as i32))
                .collect(),
        }
    }

    fn sample() -> Vec<GeneratedTaskView> {
        vec![
            view(1, "Mampostería Elemento de tabique tipo hueco.", &[("Elemento", "tabique"), ("Ladrillo", "hueco")]),
            view(2, "Mampostería Elemento de pared tipo macizo.", &[("Elemento", "pared"), ("Ladrillo", "macizo")]),
            view(3, "Mampostería.", &[]),
            view(4, "Mampostería Elemento de pared tipo hueco.", &[("Elemento", "pared"), ("Ladrillo", "hueco")]),
        ]
    }

    #[test]
    fn test_group_by_first_option_label() {
        let groups = group_by_branch(sample());
        let keys: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(keys, vec!["Sin categoría", "pared", "tabique"]);
        let pared: Vec<_> = groups["pared"].iter().map(|t| t.id.as_u128()).collect();
        assert_eq!(pared, vec![2, 4]);
    }

    #[test]
    fn test_grouping_is_complete() {
        let tasks = sample();
        let total = tasks.len();
        let groups = group_by_branch(tasks);
        assert_eq!(groups.values().map(Vec::len).sum::<usize>(), total);
    }

    #[test]
    fn test_search_matches_option_and_parameter_labels() {
        let tasks = sample();
        assert!(matches_search(&tasks[0], "HUECO"));
        assert!(matches_search(&tasks[0], "ladrillo"));
        assert!(matches_search(&tasks[2], "mampo"));
        assert!(matches_search(&tasks[1], "mam-002"));
        assert!(!matches_search(&tasks[1], "hueco"));
        assert!(matches_search(&tasks[1], "  "));
    }

    #[test]
    fn test_search_matches_sentinel_branch() {
        let tasks = sample();
        assert!(matches_search(&tasks[2], "sin categor"));
        assert!(!matches_search(&tasks[0], "sin categor"));
        assert!(matches_search_with(&tasks[2], "otros", "Otros"));
        let groups = search_and_group(sample(), "otros", "Otros");
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["Otros"]);
    }

    #[test]
    fn test_search_then_group_counts_matches_only() {
        let groups = search_and_group(sample(), "hueco", UNCATEGORIZED_LABEL);
        let counts: Vec<_> = groups.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        assert_eq!(counts, vec![("pared", 1), ("tabique", 1)]);
    }

    #[test]
    fn test_branch_tree_totals_and_rows() {
        let root = build_branch_tree(sample(), UNCATEGORIZED_LABEL);
        assert_eq!(root.total(), 4);
        assert_eq!(root.find(&["pared".to_string()]).map(BranchNode::total), Some(2));
        assert_eq!(
            root.find(&["pared".to_string(), "hueco".to_string()]).map(|n| n.tasks.len()),
            Some(1)
        );

        let collapsed = root.rows(&BTreeSet::new());
        let labels: Vec<_> = collapsed.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Sin categoría", "pared", "tabique"]);

        let mut expanded = BTreeSet::new();
        expanded.insert(vec!["pared".to_string()]);
        let rows = root.rows(&expanded);
        let labels: Vec<_> = rows.iter().map(|r| (r.label.as_str(), r.depth)).collect();
        assert_eq!(
            labels,
            vec![("Sin categoría", 0), ("pared", 0), ("hueco", 1), ("macizo", 1), ("tabique", 0)]
        );
        assert!(rows[1].expanded && rows[1].has_children);
    }

    #[test]
    fn test_all_tasks_of_subtree() {
        let root = build_branch_tree(sample(), UNCATEGORIZED_LABEL);
        let pared = root.find(&["pared".to_string()]).unwrap();
        let mut ids: Vec<_> = pared.all_tasks().iter().map(|t| t.id.as_u128()).collect();
        ids.sort();
        assert_eq!(ids, vec![2, 4]);
    }
}
