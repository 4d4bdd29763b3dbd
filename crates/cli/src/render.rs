//! Text rendering of a library tree.

use std::collections::HashMap;
use std::fmt::Write;
use shelf_core::{Item, RelativePath};

/// Format seconds as `h:mm:ss` or `m:ss`.
pub fn format_seconds(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total / 60) % 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

fn format_line(item: &Item) -> String {
    let mark = if item.is_finished { " ✓" } else { "" };
    if item.is_book() {
        format!(
            "{} {:>5.1}% {}/{}{}",
            item.title,
            item.percent_completed,
            format_seconds(item.current_time),
            format_seconds(item.duration),
            mark,
        )
    } else {
        format!(
            "{}/ {:>5.1}% {}{}",
            item.title,
            item.percent_completed,
            format_seconds(item.duration),
            mark,
        )
    }
}

/// Render `items` as an indented tree.
///
/// With `root`, only that item and its subtree are shown.
pub fn render_tree(items: &[Item], root: Option<&RelativePath>) -> String {
    let by_path: HashMap<&RelativePath, &Item> =
        items.iter().map(|i| (&i.relative_path, i)).collect();

    let tops: Vec<&Item> = match root {
        Some(root) => by_path.get(root).copied().into_iter().collect(),
        None => items.iter().filter(|i| i.parent.is_none()).collect(),
    };

    let mut out = String::new();
    let mut stack: Vec<(usize, &Item)> = tops.into_iter().rev().map(|i| (0, i)).collect();
    while let Some((depth, item)) = stack.pop() {
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), format_line(item));
        for child in item.children.iter().rev() {
            if let Some(&child) = by_path.get(child) {
                stack.push((depth + 1, child));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> RelativePath {
        RelativePath::new(s).unwrap()
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "0:00");
        assert_eq!(format_seconds(75.4), "1:15");
        assert_eq!(format_seconds(3725.0), "1:02:05");
    }

    #[test]
    fn test_render_tree_keeps_child_order() {
        let mut folder = Item::folder(path("Sci-Fi"));
        folder.children = vec![path("Sci-Fi/b"), path("Sci-Fi/a")];
        folder.percent_completed = 50.0;
        let b = Item::book(path("Sci-Fi/b"), 60.0).with_parent(path("Sci-Fi"));
        let mut a = Item::book(path("Sci-Fi/a"), 60.0).with_parent(path("Sci-Fi"));
        a.is_finished = true;

        let text = render_tree(&[a, folder, b], None);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Sci-Fi/"));
        assert!(lines[1].starts_with("  b "));
        assert!(lines[2].starts_with("  a "));
        assert!(lines[2].ends_with('✓'));
    }

    #[test]
    fn test_render_subtree() {
        let mut folder = Item::folder(path("Top"));
        folder.children = vec![path("Top/x")];
        let x = Item::book(path("Top/x"), 10.0).with_parent(path("Top"));
        let other = Item::book(path("Other"), 10.0);

        let text = render_tree(&[folder, x, other], Some(&path("Top/x")));
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("x "));
    }
}
