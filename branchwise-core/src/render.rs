//! # Tree Renderer
//!
//! Draws an assembled tree with box-drawing prefixes. Collapsed nodes hide
//! their children unless the renderer is asked to show everything.

use std::io::{self, Write};

use owo_colors::{OwoColorize, Stream, Style};

use crate::commit::CommitRef;
use crate::relations::Relationship;
use crate::tree::{CommitLeaf, CommitRole, ExpandState, PrimaryNode, SecondaryNode, SecondaryStatus, TreeNode};

const NOT_AVAILABLE: &str = "N/A";
const NO_REVISION: &str = "No Revision";

/// Renders [`TreeNode`]s as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeRenderer {
  /// Never emit ANSI colour codes.
  pub no_color: bool,
  /// Also print the children of collapsed nodes.
  pub show_collapsed: bool,
}

impl TreeRenderer {
  pub fn new(no_color: bool, show_collapsed: bool) -> Self {
    Self {
      no_color,
      show_collapsed,
    }
  }

  fn paint(&self, text: &str, style: Style) -> String {
    if self.no_color {
      text.to_string()
    } else {
      text.if_supports_color(Stream::Stdout, |text| text.style(style)).to_string()
    }
  }

  pub fn render<W: Write>(&self, writer: &mut W, nodes: &[TreeNode]) -> io::Result<()> {
    for node in nodes {
      if let TreeNode::Separator(separator) = node {
        writeln!(writer)?;
        writeln!(writer, "{}", self.paint(&format!("── {} ──", separator.label), Style::new().dimmed()))?;
        continue;
      }
      writeln!(writer, "{}", self.label(node))?;
      self.render_children(writer, node, "")?;
    }
    Ok(())
  }

  pub fn render_to_string(&self, nodes: &[TreeNode]) -> String {
    let mut buffer = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = self.render(&mut buffer, nodes);
    String::from_utf8_lossy(&buffer).into_owned()
  }

  fn render_children<W: Write>(&self, writer: &mut W, node: &TreeNode, prefix: &str) -> io::Result<()> {
    let visible = match node.expand() {
      ExpandState::Expanded => true,
      ExpandState::Collapsed => self.show_collapsed,
      ExpandState::Leaf => false,
    };
    if !visible {
      return Ok(());
    }

    let children = node.children();
    for (index, child) in children.iter().enumerate() {
      let is_last = index + 1 == children.len();
      let connector = if is_last { "└── " } else { "├── " };
      writeln!(writer, "{prefix}{connector}{}", self.label(child))?;

      let nested = format!("{prefix}{}", if is_last { "    " } else { "│   " });
      self.render_children(writer, child, &nested)?;
    }
    Ok(())
  }

  /// One-line label for `node`.
  pub fn label(&self, node: &TreeNode) -> String {
    match node {
      TreeNode::Primary(primary) => self.primary_label(primary),
      TreeNode::Secondary(secondary) => self.secondary_label(secondary),
      TreeNode::Commit(leaf) => self.commit_label(leaf),
      TreeNode::Separator(separator) => self.paint(&separator.label, Style::new().dimmed()),
    }
  }

  fn primary_label(&self, primary: &PrimaryNode) -> String {
    let branch = &primary.branch;
    let name_style = if branch.is_head {
      Style::new().blue().bold()
    } else if primary.pinned {
      Style::new().yellow().bold()
    } else {
      Style::new().bold()
    };

    let mut label = self.paint(&branch.id, name_style);
    if branch.is_head {
      label.push_str(" (HEAD)");
    }

    label.push_str("  ");
    let Some(tip) = &primary.tip else {
      label.push_str(&self.paint(NO_REVISION, Style::new().dimmed()));
      return label;
    };

    if primary.fully_merged {
      label.push_str(&self.paint("Fully Merged", Style::new().green()));
    } else {
      label.push_str(&self.paint(&format!("✓{}", primary.merged), Style::new().green()));
      label.push(' ');
      label.push_str(&self.paint(&format!("×{}", primary.unmerged), Style::new().red()));
    }

    let tip = format!("{} {}", tip.id.short(), tip.summary);
    label.push_str(&self.paint(&format!("  · {tip}"), Style::new().dimmed()));
    label
  }

  fn secondary_label(&self, secondary: &SecondaryNode) -> String {
    let status = match &secondary.status {
      SecondaryStatus::Merged => self.paint("✓ merged", Style::new().green()),
      SecondaryStatus::Unmerged {
        ahead,
        behind,
        symmetric,
      } => self.paint(&format!("↓{behind} ↑{ahead} ({symmetric})"), Style::new().red()),
      SecondaryStatus::NoRevision => self.paint(NO_REVISION, Style::new().dimmed()),
    };
    format!("{}  {status}", secondary.branch.id)
  }

  fn commit_label(&self, leaf: &CommitLeaf) -> String {
    let role = match leaf.role {
      CommitRole::Latest => "Latest commit",
      CommitRole::MergeBase => "Merge base",
    };
    let commit = leaf
      .commit
      .as_ref()
      .map_or_else(|| NOT_AVAILABLE.to_string(), describe_commit);
    format!("{role}: {}", self.paint(&commit, Style::new().cyan()))
  }
}

/// Short hash, summary, author and date of a commit, as far as known.
pub fn describe_commit(commit: &CommitRef) -> String {
  match &commit.info {
    Some(info) => format!(
      "{} {} ({}, {})",
      info.id.short(),
      info.summary,
      info.author.name,
      info.timestamp.format("%Y-%m-%d %H:%M")
    ),
    None => commit.id.short().to_string(),
  }
}

/// Sentence describing `counterpart` as seen from `viewpoint`.
pub fn describe_relationship(viewpoint: &str, counterpart: &str, relationship: &Relationship) -> String {
  let merge_base = relationship
    .merge_base
    .as_ref()
    .map_or(NOT_AVAILABLE, |id| id.short());
  let state = if relationship.is_fully_merged() {
    format!("{counterpart} is fully merged into {viewpoint}")
  } else {
    format!("{counterpart} is not merged into {viewpoint}")
  };
  format!(
    "{state}: {viewpoint} is {} ahead and {} behind {counterpart} (symmetric difference {}, merge base {merge_base})",
    plural(relationship.ahead, "commit"),
    plural(relationship.behind, "commit"),
    relationship.symmetric(),
  )
}

fn plural(count: usize, noun: &str) -> String {
  if count == 1 {
    format!("{count} {noun}")
  } else {
    format!("{count} {noun}s")
  }
}

/// Pretty JSON for a tree.
pub fn render_json(nodes: &[TreeNode]) -> serde_json::Result<String> {
  serde_json::to_string_pretty(nodes)
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::branches::{Branch, BranchTip};
  use crate::commit::{CommitId, CommitInfo, Signature};
  use crate::relations::PairOutcome;
  use crate::tree::{PassData, TreeOptions, assemble};

  fn info(id: &str, summary: &str, seconds: i64) -> CommitInfo {
    let who = Signature {
      name: "Ada".into(),
      email: "ada@example.com".into(),
    };
    CommitInfo {
      id: CommitId::new(id),
      author: who.clone(),
      committer: who,
      summary: summary.into(),
      timestamp: Utc.timestamp_opt(seconds, 0).unwrap(),
    }
  }

  fn data() -> PassData {
    let mut data = PassData::default();
    let branches = [
      (Branch::local("main").with_head(true), info("3333333aaa", "C3", 300)),
      (Branch::local("feature"), info("4444444bbb", "C4", 400)),
      (Branch::local("done"), info("2222222ccc", "C2", 200)),
    ];
    for (branch, tip) in branches {
      data.commits.insert(tip.clone());
      data.tips.insert(branch.reference.clone(), BranchTip::Commit(tip));
      data.branches.push(branch);
    }
    let compared = |ahead, behind, base: &str| {
      PairOutcome::Compared(Relationship {
        ahead,
        behind,
        merge_base: Some(CommitId::new(base)),
      })
    };
    data
      .relationships
      .record("refs/heads/main", "refs/heads/feature", compared(1, 1, "2222222ccc"));
    data
      .relationships
      .record("refs/heads/main", "refs/heads/done", compared(1, 0, "2222222ccc"));
    data
      .relationships
      .record("refs/heads/feature", "refs/heads/done", compared(1, 0, "2222222ccc"));
    data
  }

  #[test]
  fn renders_expanded_primaries_with_box_prefixes() {
    let nodes = assemble(&data(), &TreeOptions::default());
    let text = TreeRenderer::new(true, false).render_to_string(&nodes);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "main (HEAD)  ✓1 ×1  · 3333333 C3");
    assert_eq!(lines[1], "├── done  ✓ merged");
    assert_eq!(lines[2], "├── Unmerged");
    assert_eq!(lines[3], "└── feature  ↓1 ↑1 (2)");
    // feature's leaves stay collapsed, and the next primary follows.
    assert!(lines[4].starts_with("feature"));
  }

  #[test]
  fn show_collapsed_prints_commit_leaves() {
    let nodes = assemble(&data(), &TreeOptions::default());
    let text = TreeRenderer::new(true, true).render_to_string(&nodes);

    assert!(text.contains("    ├── Latest commit: 4444444 C4 (Ada, 1970-01-01 00:06)"));
    assert!(text.contains("    ├── 1 commit ahead of merge base"));
    assert!(text.contains("    └── Merge base: 2222222 C2"));
    assert!(text.contains("done  ✓0 ×2"));
  }

  #[test]
  fn branches_without_revision_are_not_reported_as_merged() {
    let mut data = PassData::default();
    let tip = info("5555555ddd", "C5", 500);
    data.commits.insert(tip.clone());
    data
      .tips
      .insert("refs/heads/main".into(), BranchTip::Commit(tip));
    data.tips.insert("refs/heads/empty".into(), BranchTip::NoRevision);
    data.branches = vec![Branch::local("main"), Branch::local("empty")];
    data.relationships.record(
      "refs/heads/main",
      "refs/heads/empty",
      PairOutcome::NoRevision {
        reference: "refs/heads/empty".into(),
      },
    );

    let nodes = assemble(&data, &TreeOptions::default());
    let text = TreeRenderer::new(true, false).render_to_string(&nodes);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines, vec!["main  ✓0 ×0  · 5555555 C5", "empty  No Revision"]);
    assert!(!text.contains("Fully Merged"));
  }

  #[test]
  fn unrelated_histories_render_a_not_available_merge_base() {
    let mut data = PassData::default();
    let branches = [
      (Branch::local("main"), info("3333333aaa", "C3", 300)),
      (Branch::local("gh-pages"), info("9999999eee", "P1", 100)),
    ];
    for (branch, tip) in branches {
      data.commits.insert(tip.clone());
      data.tips.insert(branch.reference.clone(), BranchTip::Commit(tip));
      data.branches.push(branch);
    }
    data.relationships.record(
      "refs/heads/main",
      "refs/heads/gh-pages",
      PairOutcome::Compared(Relationship {
        ahead: 3,
        behind: 1,
        merge_base: None,
      }),
    );

    let nodes = assemble(&data, &TreeOptions::default());
    let text = TreeRenderer::new(true, true).render_to_string(&nodes);

    assert!(text.contains("    ├── Latest commit: 9999999 P1"), "rendered:\n{text}");
    assert!(text.contains("    ├── 1 commit ahead of merge base"), "rendered:\n{text}");
    assert!(text.contains("    └── Merge base: N/A"), "rendered:\n{text}");
  }

  #[test]
  fn describes_relationships_from_the_viewpoint() {
    let relationship = Relationship {
      ahead: 2,
      behind: 0,
      merge_base: None,
    };
    assert_eq!(
      describe_relationship("main", "old", &relationship),
      "old is fully merged into main: main is 2 commits ahead and 0 commits behind old (symmetric difference 2, merge base N/A)"
    );
  }

  #[test]
  fn missing_commit_metadata_falls_back_to_short_hash() {
    let commit = CommitRef::unresolved(CommitId::new("0123456789"));
    assert_eq!(describe_commit(&commit), "0123456");
  }
}
