//! # Tree Assembler
//!
//! Turns the branches and relationships of one pass into the three-tier tree:
//! one primary node per branch, one secondary node per other branch under it,
//! and commit leaves under unmerged secondaries.

use serde::{Deserialize, Serialize};

use crate::branches::{Branch, BranchScope, BranchTip, BranchTips, SortMethod, compare_branches};
use crate::commit::{CommitCatalog, CommitInfo, CommitRef};
use crate::relations::{PairOutcome, Relationship, RelationshipMap};

/// Short names pinned when nothing else is configured.
pub const DEFAULT_PINNED: [&str; 4] = ["main", "master", "dev", "develop"];

/// Whether a node shows its children initially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandState {
  Expanded,
  Collapsed,
  /// Terminal node without children.
  Leaf,
}

/// A node of the assembled tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
  Primary(PrimaryNode),
  Secondary(SecondaryNode),
  Commit(CommitLeaf),
  Separator(SeparatorLeaf),
}

impl TreeNode {
  pub fn children(&self) -> &[TreeNode] {
    match self {
      TreeNode::Primary(node) => &node.children,
      TreeNode::Secondary(node) => &node.children,
      TreeNode::Commit(_) | TreeNode::Separator(_) => &[],
    }
  }

  pub fn expand(&self) -> ExpandState {
    match self {
      TreeNode::Primary(node) => node.expand,
      TreeNode::Secondary(node) => node.expand,
      TreeNode::Commit(_) | TreeNode::Separator(_) => ExpandState::Leaf,
    }
  }

  pub fn as_primary(&self) -> Option<&PrimaryNode> {
    match self {
      TreeNode::Primary(node) => Some(node),
      _ => None,
    }
  }

  pub fn as_secondary(&self) -> Option<&SecondaryNode> {
    match self {
      TreeNode::Secondary(node) => Some(node),
      _ => None,
    }
  }
}

/// A branch at the top level of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryNode {
  pub branch: Branch,
  /// Latest commit, `None` when the branch has no revision.
  pub tip: Option<CommitInfo>,
  pub pinned: bool,
  /// Secondaries fully merged into this branch.
  pub merged: usize,
  /// Secondaries with commits this branch lacks.
  pub unmerged: usize,
  /// Secondaries that could not be compared because one side has no revision.
  pub no_revision: usize,
  /// At least one secondary was compared and none of them is unmerged.
  pub fully_merged: bool,
  pub expand: ExpandState,
  pub children: Vec<TreeNode>,
}

/// How a secondary branch relates to its primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SecondaryStatus {
  Merged,
  Unmerged {
    ahead: usize,
    behind: usize,
    symmetric: usize,
  },
  NoRevision,
}

/// Another branch, seen from the primary above it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondaryNode {
  pub branch: Branch,
  pub status: SecondaryStatus,
  pub expand: ExpandState,
  pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitRole {
  /// Tip of the secondary branch.
  Latest,
  MergeBase,
}

/// A commit under an unmerged secondary. `commit` is `None` when there is no
/// such commit (unrelated histories), shown as "N/A".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitLeaf {
  pub role: CommitRole,
  pub commit: Option<CommitRef>,
}

/// A label between groups of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeparatorLeaf {
  pub label: String,
}

impl SeparatorLeaf {
  pub fn new(label: impl Into<String>) -> Self {
    Self { label: label.into() }
  }

  /// "N commit(s) ahead of merge base".
  pub fn spread(commits: usize) -> Self {
    let noun = if commits == 1 { "commit" } else { "commits" };
    Self::new(format!("{commits} {noun} ahead of merge base"))
  }
}

/// Grouping of secondaries under a primary.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChildOrder {
  /// Merged branches, then unmerged ones, in branch order
  #[default]
  MergedFirst,
  /// Unmerged branches by descending divergence, then merged ones
  Magnitude,
}

/// Ordering and presentation knobs for [`assemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
  pub sort: SortMethod,
  /// Short names listed first, in this order.
  pub pinned: Vec<String>,
  /// Put the checked-out branch right after the pinned ones.
  pub head_first: bool,
  pub child_order: ChildOrder,
  /// Expand primaries that have unmerged secondaries.
  pub expand_primary: bool,
  /// Expand unmerged secondaries.
  pub expand_secondary: bool,
}

impl Default for TreeOptions {
  fn default() -> Self {
    Self {
      sort: SortMethod::default(),
      pinned: DEFAULT_PINNED.iter().map(|name| name.to_string()).collect(),
      head_first: false,
      child_order: ChildOrder::default(),
      expand_primary: true,
      expand_secondary: false,
    }
  }
}

impl TreeOptions {
  fn pin_rank(&self, branch: &Branch) -> usize {
    self
      .pinned
      .iter()
      .position(|name| name == branch.name())
      .unwrap_or(self.pinned.len())
  }

  pub fn is_pinned(&self, branch: &Branch) -> bool {
    self.pinned.iter().any(|name| name == branch.name())
  }
}

/// Everything one pass gathered from the repository.
#[derive(Debug, Clone, Default)]
pub struct PassData {
  pub branches: Vec<Branch>,
  pub tips: BranchTips,
  pub relationships: RelationshipMap,
  /// Metadata of branch tips and merge bases.
  pub commits: CommitCatalog,
}

impl PassData {
  fn tip(&self, branch: &Branch) -> Option<&CommitInfo> {
    self.tips.get(&branch.reference).and_then(BranchTip::commit)
  }
}

/// Branches of one scope, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<'a> {
  pub scope: BranchScope,
  pub branches: Vec<&'a Branch>,
}

/// Order `branches` into non-empty scope partitions.
///
/// Within a partition: pinned names first in configured order, then the
/// checked-out branch when `head_first` is set, then the base sort.
pub fn order_branches<'a>(branches: &'a [Branch], tips: &BranchTips, options: &TreeOptions) -> Vec<Partition<'a>> {
  let mut ordered: Vec<&Branch> = branches.iter().collect();
  ordered.sort_by(|a, b| compare_branches(a, b, options.sort, tips));
  ordered.sort_by_key(|branch| {
    let head_rank = usize::from(!(options.head_first && branch.is_head));
    (options.pin_rank(branch), head_rank)
  });

  BranchScope::ORDER
    .into_iter()
    .map(|scope| Partition {
      scope,
      branches: ordered.iter().copied().filter(|branch| branch.scope == scope).collect(),
    })
    .filter(|partition| !partition.branches.is_empty())
    .collect()
}

/// Build the tree for one pass. Fewer than two branches give an empty tree.
pub fn assemble(data: &PassData, options: &TreeOptions) -> Vec<TreeNode> {
  if data.branches.len() < 2 {
    return Vec::new();
  }

  let partitions = order_branches(&data.branches, &data.tips, options);
  let ordered: Vec<&Branch> = partitions
    .iter()
    .flat_map(|partition| partition.branches.iter().copied())
    .collect();

  let mut nodes = Vec::with_capacity(data.branches.len() + partitions.len());
  for (index, partition) in partitions.iter().enumerate() {
    if index > 0 {
      nodes.push(TreeNode::Separator(SeparatorLeaf::new(partition.scope.heading())));
    }
    for primary in &partition.branches {
      nodes.push(TreeNode::Primary(primary_node(data, options, primary, &ordered)));
    }
  }
  nodes
}

fn primary_node(data: &PassData, options: &TreeOptions, primary: &Branch, ordered: &[&Branch]) -> PrimaryNode {
  let mut merged = Vec::new();
  let mut unmerged: Vec<(usize, SecondaryNode)> = Vec::new();
  let mut missing = Vec::new();

  for secondary in ordered.iter().copied().filter(|branch| *branch != primary) {
    match data.relationships.view(&primary.reference, &secondary.reference) {
      Some(PairOutcome::Compared(relationship)) if relationship.is_fully_merged() => {
        merged.push(leaf_secondary(secondary, SecondaryStatus::Merged));
      }
      Some(PairOutcome::Compared(relationship)) => {
        let node = unmerged_secondary(data, options, secondary, &relationship);
        unmerged.push((relationship.symmetric(), node));
      }
      Some(PairOutcome::NoRevision { .. }) | None => {
        missing.push(leaf_secondary(secondary, SecondaryStatus::NoRevision));
      }
    }
  }

  let merged_count = merged.len();
  let unmerged_count = unmerged.len();
  let no_revision_count = missing.len();
  if options.child_order == ChildOrder::Magnitude {
    unmerged.sort_by(|a, b| b.0.cmp(&a.0));
  }
  let unmerged: Vec<SecondaryNode> = unmerged.into_iter().map(|(_, node)| node).collect();

  let mut children = Vec::with_capacity(merged_count + unmerged_count + no_revision_count + 1);
  let (first, second, label) = match options.child_order {
    ChildOrder::MergedFirst => (merged, unmerged, "Unmerged"),
    ChildOrder::Magnitude => (unmerged, merged, "Merged"),
  };
  let both = !first.is_empty() && !second.is_empty();
  children.extend(first.into_iter().map(TreeNode::Secondary));
  if both {
    children.push(TreeNode::Separator(SeparatorLeaf::new(label)));
  }
  children.extend(second.into_iter().map(TreeNode::Secondary));
  children.extend(missing.into_iter().map(TreeNode::Secondary));

  let expand = if children.is_empty() {
    ExpandState::Leaf
  } else if unmerged_count > 0 && options.expand_primary {
    ExpandState::Expanded
  } else {
    ExpandState::Collapsed
  };

  PrimaryNode {
    branch: primary.clone(),
    tip: data.tip(primary).cloned(),
    pinned: options.is_pinned(primary),
    merged: merged_count,
    unmerged: unmerged_count,
    no_revision: no_revision_count,
    fully_merged: merged_count > 0 && unmerged_count == 0,
    expand,
    children,
  }
}

fn leaf_secondary(branch: &Branch, status: SecondaryStatus) -> SecondaryNode {
  SecondaryNode {
    branch: branch.clone(),
    status,
    expand: ExpandState::Leaf,
    children: Vec::new(),
  }
}

fn unmerged_secondary(
  data: &PassData,
  options: &TreeOptions,
  secondary: &Branch,
  relationship: &Relationship,
) -> SecondaryNode {
  let latest = CommitLeaf {
    role: CommitRole::Latest,
    commit: data.tip(secondary).cloned().map(CommitRef::from),
  };
  let merge_base = CommitLeaf {
    role: CommitRole::MergeBase,
    commit: relationship
      .merge_base
      .as_ref()
      .map(|id| data.commits.commit_ref(id)),
  };

  SecondaryNode {
    branch: secondary.clone(),
    status: SecondaryStatus::Unmerged {
      ahead: relationship.ahead,
      behind: relationship.behind,
      symmetric: relationship.symmetric(),
    },
    expand: if options.expand_secondary {
      ExpandState::Expanded
    } else {
      ExpandState::Collapsed
    },
    children: vec![
      TreeNode::Commit(latest),
      TreeNode::Separator(SeparatorLeaf::spread(relationship.behind)),
      TreeNode::Commit(merge_base),
    ],
  }
}
