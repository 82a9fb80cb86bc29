//! Parsing and resolution of QIIME/GTDB lineage strings.
//!
//! A lineage such as `d__Bacteria;p__Proteobacteria;c__Gammaproteobacteria`
//! lists its levels from the outermost ancestor to the leaf. Each level is a
//! rank code and a description separated by a double underscore.
//!
//! Greengenes exports leave trailing levels without a description
//! (`g__;s__`). Such a level borrows the rank and description of the next
//! level towards the root, so the row resolves to the deepest level that
//! actually has a name and no empty-named node is ever created.

use crate::errors::{LineageError, Result, TaxoError};
use crate::rank::NO_RANK;
use crate::tree::TaxonomyTree;

/// Separator between the rank code and the description of one level.
pub const RANK_SEPARATOR: &str = "__";
/// Separator between levels.
pub const LEVEL_SEPARATOR: char = ';';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineageToken<'a> {
    pub rank: &'a str,
    pub description: &'a str,
}

impl<'a> LineageToken<'a> {
    /// Split one level at the first `__`.
    ///
    /// A level without the separator has a malformed prefix; the whole text is
    /// taken as the description with no rank.
    pub fn parse(token: &'a str) -> Self {
        let token = token.trim();
        match token.split_once(RANK_SEPARATOR) {
            Some((rank, description)) => {
                let rank = rank.trim();
                Self {
                    rank: if rank.is_empty() { NO_RANK } else { rank },
                    description: description.trim(),
                }
            }
            None => Self {
                rank: NO_RANK,
                description: token,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
    }
}

/// The levels of one row, leaf first.
///
/// Index 0 is the most specific level and the last index the outermost
/// ancestor, which is the reverse of the order in the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage<'a> {
    tokens: Vec<LineageToken<'a>>,
}

/// What resolving one lineage did to the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Node of the most specific named level.
    pub leaf: u64,
    /// Nodes created while resolving this lineage.
    pub new_nodes: usize,
    /// Set when the outermost level was unknown and became a new node without a parent.
    pub new_top: Option<u64>,
}

impl<'a> Lineage<'a> {
    /// Parse the lineage column of a row. Blank levels, e.g. from a trailing
    /// `;`, are dropped.
    pub fn parse(column: &'a str) -> Self {
        let mut tokens: Vec<_> = column
            .split(LEVEL_SEPARATOR)
            .filter(|t| !t.trim().is_empty())
            .map(LineageToken::parse)
            .collect();
        tokens.reverse();
        Self { tokens }
    }

    /// Build from tokens that are already leaf first.
    pub fn from_leaf_first(tokens: Vec<LineageToken<'a>>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[LineageToken<'a>] {
        &self.tokens
    }

    /// Rank and description each level resolves to once empty descriptions
    /// have borrowed from the level above them.
    pub fn effective_tokens(&self) -> std::result::Result<Vec<LineageToken<'a>>, LineageError> {
        if self.tokens.is_empty() {
            return Err(LineageError::Empty);
        }
        let mut effective = vec![self.tokens[0]; self.tokens.len()];
        let mut above: Option<LineageToken<'a>> = None;
        for (i, token) in self.tokens.iter().enumerate().rev() {
            if token.description.contains('\t') || token.rank.contains('\t') {
                return Err(LineageError::InvalidName(i));
            }
            let resolved = if token.is_empty() {
                above.ok_or(LineageError::EmptyChain(i))?
            } else {
                *token
            };
            effective[i] = resolved;
            above = Some(resolved);
        }
        Ok(effective)
    }

    /// Resolve the lineage against `tree`, creating whatever is missing, and
    /// return the leaf node.
    ///
    /// Levels are walked from the outermost ancestor to the leaf, carrying the
    /// id of the level above. A description that already has a node reuses it
    /// together with whatever edge it got when it was first seen; a different
    /// parent implied by this row is not recorded. A new outermost level gets
    /// no edge at all, so only lineages whose top name matches an existing
    /// node (e.g. the seeded `Bacteria`) hang under the root.
    ///
    /// The outer `Result` carries tree errors that must abort a pass, the
    /// inner one a row that could not be resolved.
    pub fn resolve(
        &self,
        tree: &mut TaxonomyTree,
    ) -> Result<std::result::Result<Resolved, LineageError>> {
        let effective = match self.effective_tokens() {
            Ok(tokens) => tokens,
            Err(e) => return Ok(Err(e)),
        };

        let mut new_nodes = 0;
        let mut new_top = None;
        let mut parent: Option<u64> = None;
        for token in effective.iter().rev() {
            tree.add_rank(token.rank);
            let id = match tree.lookup(token.description) {
                Some(id) => id,
                None => {
                    let id = tree.add_node(token.description);
                    new_nodes += 1;
                    match parent {
                        Some(parent_id) => {
                            tree.add_link(id, parent_id, token.rank)?;
                        }
                        None => new_top = Some(id),
                    }
                    id
                }
            };
            parent = Some(id);
        }

        // effective_tokens guarantees at least one level
        let leaf = parent
            .ok_or_else(|| TaxoError::Parse("lineage resolved to no levels".to_string()))?;
        Ok(Ok(Resolved {
            leaf,
            new_nodes,
            new_top,
        }))
    }
}
