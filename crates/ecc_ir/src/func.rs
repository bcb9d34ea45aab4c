//! Function-under-construction: basic blocks, value names, and the
//! block-termination policy.
//!
//! Value and slot names are `%.N`, numbered per function in emission
//! order. The entry block carries the `alloca`s for every fixed-size slot
//! no matter where in the body the declaration appears; dynamic (VLA)
//! allocas stay at their declaration point.
//!
//! Termination policy: once a block has a terminator, every further
//! instruction or terminator aimed at it is silently dropped. Dead-end
//! constructs (`break` followed by an `if`, an `endif` both of whose arms
//! returned) fall out of this rule without special cases; join blocks
//! that end up empty and unreferenced are pruned at render time.

use std::collections::{BTreeSet, HashMap};

/// Index of a basic block within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockId(usize);

#[derive(Debug)]
struct Block {
    label: String,
    insts: Vec<String>,
    term: Option<String>,
    /// Number of branch instructions targeting this block.
    refs: u32,
}

/// Builder for one IR function.
#[derive(Debug)]
pub struct FuncBuilder {
    name: String,
    ret: String,
    params: Vec<String>,
    counter: u32,
    entry_allocas: Vec<String>,
    blocks: Vec<Block>,
    current: usize,
    label_counts: HashMap<String, u32>,
    /// Snippets called by this function.
    pub used_snippets: BTreeSet<String>,
    /// Intrinsics referenced by this function.
    pub used_intrinsics: BTreeSet<&'static str>,
}

impl FuncBuilder {
    /// `ret` like `"i32"` or `"zeroext i1"`; `params` like `"i32 %0"`.
    pub fn new(name: &str, ret: String, params: Vec<String>) -> Self {
        let entry = Block {
            label: "entry".to_string(),
            insts: Vec::new(),
            term: None,
            refs: 1, // the implicit fallthrough from the function prologue
        };
        let mut label_counts = HashMap::new();
        label_counts.insert("entry".to_string(), 1);
        Self {
            name: name.to_string(),
            ret,
            params,
            counter: 0,
            entry_allocas: Vec::new(),
            blocks: vec![entry],
            current: 0,
            label_counts,
            used_snippets: BTreeSet::new(),
            used_intrinsics: BTreeSet::new(),
        }
    }

    /// Allocate a fresh `%.N` name.
    pub fn fresh(&mut self) -> String {
        let name = format!("%.{}", self.counter);
        self.counter += 1;
        name
    }

    /// Label of the block instructions currently go to.
    pub fn current_label(&self) -> &str {
        &self.blocks[self.current].label
    }

    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current].term.is_some()
    }

    /// Create a new block; `prefix` is the contextual label, uniquified
    /// with a numeric suffix on repetition within the function.
    pub fn add_block(&mut self, prefix: &str) -> BlockId {
        let count = self.label_counts.entry(prefix.to_string()).or_insert(0);
        let label = if *count == 0 {
            prefix.to_string()
        } else {
            format!("{}{}", prefix, count)
        };
        *count += 1;
        self.blocks.push(Block {
            label,
            insts: Vec::new(),
            term: None,
            refs: 0,
        });
        BlockId(self.blocks.len() - 1)
    }

    pub fn label(&self, id: BlockId) -> &str {
        &self.blocks[id.0].label
    }

    /// Make `id` the current block.
    pub fn position_at(&mut self, id: BlockId) {
        self.current = id.0;
    }

    /// Append an instruction to the current block; dropped if the block
    /// is terminated.
    pub fn emit(&mut self, inst: impl Into<String>) {
        let block = &mut self.blocks[self.current];
        if block.term.is_none() {
            block.insts.push(inst.into());
        }
    }

    /// Append an entry-block `alloca`, regardless of the current block.
    pub fn emit_entry_alloca(&mut self, ty: &str, align: u64) -> String {
        let name = self.fresh();
        self.entry_allocas
            .push(format!("{} = alloca {}, align {}", name, ty, align));
        name
    }

    /// Unconditional branch. No-op on a terminated block.
    pub fn br(&mut self, target: BlockId) {
        if self.blocks[self.current].term.is_none() {
            let label = self.blocks[target.0].label.clone();
            self.blocks[self.current].term = Some(format!("br label %{}", label));
            self.blocks[target.0].refs += 1;
        }
    }

    /// Conditional branch on an `i1` value. No-op on a terminated block.
    pub fn cond_br(&mut self, cond: &str, then_block: BlockId, else_block: BlockId) {
        if self.blocks[self.current].term.is_none() {
            let t = self.blocks[then_block.0].label.clone();
            let e = self.blocks[else_block.0].label.clone();
            self.blocks[self.current].term =
                Some(format!("br i1 {}, label %{}, label %{}", cond, t, e));
            self.blocks[then_block.0].refs += 1;
            self.blocks[else_block.0].refs += 1;
        }
    }

    /// Return terminator. No-op on a terminated block.
    pub fn ret(&mut self, text: String) {
        if self.blocks[self.current].term.is_none() {
            self.blocks[self.current].term = Some(text);
        }
    }

    /// Render the finished `define`. Unterminated reachable blocks get a
    /// function-exit terminator (`ret void`, or a typed `undef` return for
    /// the value-returning case C99 leaves undefined); empty unreferenced
    /// join blocks are pruned.
    pub fn finish(mut self) -> String {
        let fallback = if self.ret.contains("void") {
            "ret void".to_string()
        } else {
            let ty = self.ret.split_whitespace().last().unwrap().to_string();
            format!("ret {} undef", ty)
        };
        for block in &mut self.blocks {
            if block.term.is_none() && (block.refs > 0 || !block.insts.is_empty()) {
                block.term = Some(fallback.clone());
            }
        }

        let mut out = String::new();
        out.push_str(&format!(
            "define {} @{}({}) {{\n",
            self.ret,
            self.name,
            self.params.join(", ")
        ));
        for (i, block) in self.blocks.iter().enumerate() {
            if block.refs == 0 && block.insts.is_empty() && i != 0 {
                continue; // pruned join block
            }
            if i != 0 {
                out.push_str(&format!("{}:\n", block.label));
            } else {
                out.push_str("entry:\n");
                for alloca in &self.entry_allocas {
                    out.push_str("  ");
                    out.push_str(alloca);
                    out.push('\n');
                }
            }
            for inst in &block.insts {
                out.push_str("  ");
                out.push_str(inst);
                out.push('\n');
            }
            if let Some(term) = &block.term {
                out.push_str("  ");
                out.push_str(term);
                out.push('\n');
            }
        }
        out.push_str("}\n");
        out
    }
}
