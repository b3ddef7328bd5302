//! Phase-tier assignment: matching idle workers to `todo/` items (spec.md §4.5).

use super::{list_md_files, load_item, Complexity, HopperItem, Priority};
use std::path::{Path, PathBuf};

fn priority_rank(p: Option<Priority>) -> u8 {
    match p {
        Some(Priority::High) => 0,
        Some(Priority::Medium) => 1,
        Some(Priority::Low) => 2,
        None => 3,
    }
}

fn complexity_rank(c: Option<Complexity>) -> u8 {
    match c {
        Some(Complexity::Small) => 0,
        Some(Complexity::Medium) => 1,
        Some(Complexity::Large) => 2,
        None => 3,
    }
}

/// Order `todo/` items by highest Priority first, then smallest Complexity, then
/// alphabetical by filename (spec.md §4.5 "Selection").
pub fn sort_for_assignment(items: &mut [HopperItem]) {
    items.sort_by(|a, b| {
        priority_rank(a.meta.priority)
            .cmp(&priority_rank(b.meta.priority))
            .then_with(|| complexity_rank(a.meta.complexity).cmp(&complexity_rank(b.meta.complexity)))
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// Pair up to `min(|idle_workers|, |todo_items|)` idle workers with todo items, in
/// assignment order. `idle_workers` is expected in a stable order (e.g.
/// alphabetical by worker id) chosen by the caller.
pub fn pair_assignments<'a>(
    idle_workers: &'a [String],
    todo_dir: &Path,
) -> std::io::Result<Vec<(&'a str, HopperItem)>> {
    let mut items: Vec<HopperItem> = list_md_files(todo_dir)?
        .into_iter()
        .filter_map(|p| load_item(&p).ok())
        .collect();
    sort_for_assignment(&mut items);

    let n = idle_workers.len().min(items.len());
    Ok(idle_workers
        .iter()
        .take(n)
        .map(String::as_str)
        .zip(items.into_iter().take(n))
        .collect())
}

/// Atomically move a hopper item from one tier directory to another (todo →
/// in-progress, in-progress → done, or a `defer` back to the project tier).
/// Filesystem rename is atomic within one filesystem (spec.md §5).
pub fn move_item(item_path: &Path, dest_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dest_dir)?;
    let filename = item_path
        .file_name()
        .expect("hopper item path always has a filename");
    let dest = dest_dir.join(filename);
    std::fs::rename(item_path, &dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hopper::HopperItemMeta;
    use tempfile::TempDir;

    fn item(path: &str, priority: Option<Priority>, complexity: Option<Complexity>) -> HopperItem {
        HopperItem {
            path: PathBuf::from(path),
            meta: HopperItemMeta {
                priority,
                complexity,
                tags: Vec::new(),
                suggested_phase: None,
                estimate: None,
            },
        }
    }

    #[test]
    fn sorts_by_priority_then_complexity_then_filename() {
        let mut items = vec![
            item("z.md", Some(Priority::High), Some(Complexity::Medium)),
            item("a.md", Some(Priority::High), Some(Complexity::Small)),
            item("m.md", Some(Priority::Medium), Some(Complexity::Small)),
        ];
        sort_for_assignment(&mut items);
        let order: Vec<_> = items.iter().map(|i| i.path.to_str().unwrap()).collect();
        assert_eq!(order, vec!["a.md", "z.md", "m.md"]);
    }

    #[test]
    fn pair_assignments_caps_at_min_of_idle_and_todo() {
        let dir = TempDir::new().unwrap();
        let todo = dir.path().join("todo");
        std::fs::create_dir_all(&todo).unwrap();
        std::fs::write(todo.join("fix-1.md"), "**Priority:** High\n**Complexity:** Small\n").unwrap();
        std::fs::write(todo.join("fix-2.md"), "**Priority:** High\n**Complexity:** Small\n").unwrap();
        std::fs::write(todo.join("fix-3.md"), "**Priority:** High\n**Complexity:** Small\n").unwrap();

        let idle = vec!["alice".to_string(), "bob".to_string()];
        let pairs = pair_assignments(&idle, &todo).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, "alice");
        assert_eq!(pairs[1].0, "bob");
    }

    #[test]
    fn move_item_renames_across_tier_directories() {
        let dir = TempDir::new().unwrap();
        let todo = dir.path().join("todo");
        let in_progress = dir.path().join("in-progress");
        std::fs::create_dir_all(&todo).unwrap();
        let src = todo.join("task.md");
        std::fs::write(&src, "content").unwrap();

        let dest = move_item(&src, &in_progress).unwrap();
        assert!(!src.exists());
        assert!(dest.exists());
        assert_eq!(dest, in_progress.join("task.md"));
    }
}
