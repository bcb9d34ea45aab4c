//! IR emission: typed AST → textual LLVM IR module.
//!
//! The emitter walks each defined function, allocates storage (entry-block
//! slots for parameters and fixed-size locals, dynamic stack allocation
//! for VLAs), builds the basic-block graph, and lowers every arithmetic,
//! logical, and conversion operation to a call into the snippet library.
//! Address computation (subscripts, member access) is emitted inline —
//! it is lowering mechanics, not C arithmetic.

use std::collections::{BTreeSet, HashMap};

use ecc_ast::expr::{BinOp, LogicalOp, UnOp};
use ecc_ast::stmt::ForInit;
use ecc_ast::{
    ArrayExtent, CType, ExprId, ExprKind, Function, LocalId, Span, StmtId, StmtKind,
    TranslationUnit, TypeId,
};
use ecc_types as types;

use crate::func::{BlockId, FuncBuilder};
use crate::snippets::{self, SnippetRegistry};

/// Emission failure: an operation with no snippet at the required
/// signature (everything else is ruled out during semantic analysis).
#[derive(Debug, Clone)]
pub struct EmitError {
    pub span: Span,
    pub message: String,
}

impl std::fmt::Display for EmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}..{}] {}", self.span.start, self.span.end, self.message)
    }
}

type Result<T> = std::result::Result<T, EmitError>;

/// LLVM type of a C type. Aggregates are emitted as byte blobs because
/// all addressing is done with byte offsets.
pub fn llvm_type_of(table: &ecc_ast::TypeTable, ty: TypeId) -> String {
    match table.get(ty) {
        CType::Void => "void".to_string(),
        CType::Pointer(_) => "ptr".to_string(),
        CType::Array { .. } | CType::Struct(_) => {
            let size = types::size_of(table, ty).unwrap_or(0);
            format!("[{} x i8]", size)
        }
        other => snippets::llvm_type(other.c_name().expect("basic type")).to_string(),
    }
}

/// Floating constants are always written in 64-bit hex so LLVM accepts
/// them exactly; `float` constants are pre-truncated to keep the value
/// representable, and `long double` uses the 80-bit `0xK` form.
pub fn float_literal(table: &ecc_ast::TypeTable, ty: TypeId, value: f64) -> String {
    match table.get(ty) {
        CType::Float => format!("0x{:016X}", ((value as f32) as f64).to_bits()),
        CType::LongDouble => format!("0xK{}", f80_bits(value)),
        _ => format!("0x{:016X}", value.to_bits()),
    }
}

/// Encode an f64 as x87 80-bit extended precision hex digits.
fn f80_bits(value: f64) -> String {
    let bits = value.to_bits();
    let sign = (bits >> 63) & 1;
    let exp = ((bits >> 52) & 0x7ff) as i64;
    let frac = bits & 0x000f_ffff_ffff_ffff;

    let (hi, lo): (u64, u64) = if exp == 0 {
        // Zero (subnormal doubles round to zero here; they cannot be
        // written as decimal floating constants anyway).
        (sign << 15, 0)
    } else if exp == 0x7ff {
        // Infinity / NaN.
        ((sign << 15) | 0x7fff, (1u64 << 63) | (frac << 11))
    } else {
        let e80 = (exp - 1023 + 16383) as u64;
        ((sign << 15) | e80, (1u64 << 63) | (frac << 11))
    };
    format!("{:04X}{:016X}", hi, lo)
}

/// The return-position attribute string for a type (`_Bool` widens).
fn ret_type_str(table: &ecc_ast::TypeTable, ty: TypeId) -> String {
    if *table.get(ty) == CType::Bool {
        "zeroext i1".to_string()
    } else {
        llvm_type_of(table, ty)
    }
}

fn param_type_str(table: &ecc_ast::TypeTable, ty: TypeId) -> String {
    if *table.get(ty) == CType::Bool {
        "i1 zeroext".to_string()
    } else {
        llvm_type_of(table, ty)
    }
}

/// Emit a whole translation unit as one IR module: every defined
/// function, a `declare` for every function that is referenced but never
/// defined, each referenced snippet exactly once, and the stack
/// intrinsics when VLAs are present.
pub fn emit_module(tu: &TranslationUnit) -> Result<String> {
    let mut bodies = Vec::new();
    let mut used_snippets: BTreeSet<String> = BTreeSet::new();
    let mut used_intrinsics: BTreeSet<&'static str> = BTreeSet::new();

    for f in &tu.functions {
        if !f.is_defined() {
            continue;
        }
        let emitter = FnEmitter::new(tu, f);
        let (text, snips, intrinsics) = emitter.emit()?;
        bodies.push(text);
        used_snippets.extend(snips);
        used_intrinsics.extend(intrinsics);
    }

    let mut out = String::new();
    out.push_str(&format!("target datalayout = \"{}\"\n\n", types::DATA_LAYOUT));

    for body in bodies {
        out.push_str(&body);
        out.push('\n');
    }

    for f in &tu.functions {
        if f.is_defined() {
            continue;
        }
        let params: Vec<String> = f
            .param_types
            .iter()
            .map(|&p| param_type_str(&tu.types, p))
            .collect();
        out.push_str(&format!(
            "declare {} @{}({})\n",
            ret_type_str(&tu.types, f.ret),
            f.name,
            params.join(", ")
        ));
    }
    if tu.functions.iter().any(|f| !f.is_defined()) {
        out.push('\n');
    }

    let registry = SnippetRegistry::global();
    for symbol in &used_snippets {
        let snippet = registry.lookup(symbol).expect("recorded snippet exists");
        out.push_str(&snippet.ir);
        out.push('\n');
    }

    for intrinsic in &used_intrinsics {
        out.push_str(intrinsic);
        out.push('\n');
    }

    Ok(out)
}

const STACKSAVE_DECL: &str = "declare ptr @llvm.stacksave.p0()";
const STACKRESTORE_DECL: &str = "declare void @llvm.stackrestore.p0(ptr)";

/// A value produced by expression emission: an IR name (or literal), the
/// C type, and whether the name is the address of the value (lvalue) or
/// the value itself.
#[derive(Debug, Clone)]
struct EVal {
    name: String,
    ty: TypeId,
    lvalue: bool,
}

#[derive(Debug, Clone)]
struct LoopCtx {
    break_block: BlockId,
    continue_block: BlockId,
    /// Scope depth at loop entry; scopes deeper than this are inside the
    /// loop body and must restore their VLA saves on break/continue.
    depth: usize,
}

struct FnEmitter<'a> {
    tu: &'a TranslationUnit,
    f: &'a Function,
    b: FuncBuilder,
    /// Slot pointer name per local, created on first declaration.
    slots: Vec<Option<String>>,
    /// Evaluated VLA extent values (as i64 names), per extent expression.
    vla_extents: HashMap<ExprId, String>,
    /// One frame per live scope; the entry is the scope's stack-save
    /// name once the scope has declared a VLA.
    scopes: Vec<Option<String>>,
    loops: Vec<LoopCtx>,
}

impl<'a> FnEmitter<'a> {
    fn new(tu: &'a TranslationUnit, f: &'a Function) -> Self {
        let params: Vec<String> = f
            .param_types
            .iter()
            .enumerate()
            .map(|(i, &p)| format!("{} %{}", param_type_str(&tu.types, p), i))
            .collect();
        let b = FuncBuilder::new(&f.name, ret_type_str(&tu.types, f.ret), params);
        Self {
            tu,
            f,
            b,
            slots: vec![None; f.locals.len()],
            vla_extents: HashMap::new(),
            scopes: Vec::new(),
            loops: Vec::new(),
        }
    }

    fn table(&self) -> &ecc_ast::TypeTable {
        &self.tu.types
    }

    fn c_name(&self, ty: TypeId) -> &'static str {
        self.table().get(ty).c_name().expect("arithmetic type")
    }

    fn ll(&self, ty: TypeId) -> String {
        llvm_type_of(self.table(), ty)
    }

    fn align(&self, ty: TypeId) -> u64 {
        types::align_of(self.table(), ty)
    }

    fn err(&self, span: Span, message: impl Into<String>) -> EmitError {
        EmitError {
            span,
            message: message.into(),
        }
    }

    fn emit(mut self) -> Result<(String, BTreeSet<String>, BTreeSet<&'static str>)> {
        // Spill parameters into their slots.
        for (i, &local) in self.f.params.iter().enumerate() {
            let ty = self.f.local(local).ty;
            let ll = self.ll(ty);
            let align = self.align(ty);
            let slot = self.b.emit_entry_alloca(&ll, align);
            self.b
                .emit(format!("store {} %{}, ptr {}, align {}", ll, i, slot, align));
            self.slots[local.0 as usize] = Some(slot);
        }

        let body = self.f.body.expect("defined function");
        self.emit_stmt(body)?;

        let used_snippets = std::mem::take(&mut self.b.used_snippets);
        let used_intrinsics = std::mem::take(&mut self.b.used_intrinsics);
        Ok((self.b.finish(), used_snippets, used_intrinsics))
    }

    // === Statements ===

    fn emit_stmt(&mut self, s: StmtId) -> Result<()> {
        let stmt = self.tu.stmt(s);
        match &stmt.kind {
            StmtKind::Compound(items) => {
                self.scopes.push(None);
                let result = items.iter().try_for_each(|&item| self.emit_stmt(item));
                self.restore_scope_on_fallthrough();
                self.scopes.pop();
                result
            }
            StmtKind::Decl { local, init } => self.emit_decl(*local, *init),
            StmtKind::Expr(e) => {
                self.emit_expr(*e)?;
                Ok(())
            }
            StmtKind::Empty => Ok(()),
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => self.emit_if(*cond, *then_stmt, *else_stmt),
            StmtKind::While { cond, body } => self.emit_while(*cond, *body),
            StmtKind::DoWhile { body, cond } => self.emit_do_while(*body, *cond),
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.emit_for(init.as_ref(), *cond, *step, *body),
            StmtKind::Break => {
                let target = self.loops.last().cloned().expect("sema checked loop depth");
                self.restore_vla_saves_above(target.depth);
                self.b.br(target.break_block);
                Ok(())
            }
            StmtKind::Continue => {
                let target = self.loops.last().cloned().expect("sema checked loop depth");
                self.restore_vla_saves_above(target.depth);
                self.b.br(target.continue_block);
                Ok(())
            }
            StmtKind::Return(value) => self.emit_return(*value, stmt.span),
            StmtKind::Labeled { stmt, .. } => self.emit_stmt(*stmt),
        }
    }

    /// Fallthrough out of the innermost scope: restore its VLA save.
    fn restore_scope_on_fallthrough(&mut self) {
        if let Some(Some(save)) = self.scopes.last() {
            let save = save.clone();
            self.b.used_intrinsics.insert(STACKRESTORE_DECL);
            self.b
                .emit(format!("call void @llvm.stackrestore.p0(ptr {})", save));
        }
    }

    /// Early exit (break/continue/return): restore every VLA save of the
    /// scopes deeper than `depth`, innermost first.
    fn restore_vla_saves_above(&mut self, depth: usize) {
        let saves: Vec<String> = self.scopes[depth..]
            .iter()
            .rev()
            .filter_map(|s| s.clone())
            .collect();
        for save in saves {
            self.b.used_intrinsics.insert(STACKRESTORE_DECL);
            self.b
                .emit(format!("call void @llvm.stackrestore.p0(ptr {})", save));
        }
    }

    fn emit_decl(&mut self, local: LocalId, init: Option<ExprId>) -> Result<()> {
        let ty = self.f.local(local).ty;

        if self.has_variable_extent(ty) {
            self.emit_vla_alloca(local, ty)?;
        } else if self.slots[local.0 as usize].is_none() {
            let alloca_ty = self.ll(ty);
            let align = self.align(ty);
            let slot = self.b.emit_entry_alloca(&alloca_ty, align);
            self.slots[local.0 as usize] = Some(slot);
        }

        if let Some(init) = init {
            let value = self.emit_rvalue(init)?;
            let value = self.convert(value, ty)?;
            let slot = self.slots[local.0 as usize].clone().unwrap();
            let ll = self.ll(ty);
            let align = self.align(ty);
            self.b.emit(format!(
                "store {} {}, ptr {}, align {}",
                ll, value.name, slot, align
            ));
        }
        Ok(())
    }

    fn has_variable_extent(&self, ty: TypeId) -> bool {
        match self.table().get(ty) {
            CType::Array { element, extent } => {
                matches!(extent, ArrayExtent::Variable(_)) || self.has_variable_extent(*element)
            }
            _ => false,
        }
    }

    /// Dynamic stack allocation for a VLA, preceded by the scope's one
    /// stack save. The total byte count multiplies every extent at
    /// run time; each evaluated extent is remembered for later subscript
    /// stride computation.
    fn emit_vla_alloca(&mut self, local: LocalId, ty: TypeId) -> Result<()> {
        if self.scopes.last().map(|s| s.is_none()).unwrap_or(false) {
            self.b.used_intrinsics.insert(STACKSAVE_DECL);
            let save = self.b.fresh();
            self.b
                .emit(format!("{} = call ptr @llvm.stacksave.p0()", save));
            *self.scopes.last_mut().unwrap() = Some(save);
        }

        let mut byte_count: u64 = 1;
        let mut runtime: Vec<String> = Vec::new();
        let mut cursor = ty;
        loop {
            match self.table().get(cursor) {
                CType::Array { element, extent } => {
                    match extent {
                        ArrayExtent::Fixed(n) => byte_count *= n,
                        ArrayExtent::Variable(e) => {
                            let e = *e;
                            let element = *element;
                            let v = self.emit_rvalue(e)?;
                            let wide = self.widen_to_i64(&v);
                            self.vla_extents.insert(e, wide.clone());
                            runtime.push(wide);
                            cursor = element;
                            continue;
                        }
                        ArrayExtent::Incomplete => {
                            return Err(self.err(
                                self.f.local(local).span,
                                "incomplete array type in declaration",
                            ))
                        }
                    }
                    cursor = *element;
                }
                _ => break,
            }
        }
        let elem_size = types::size_of(self.table(), cursor).unwrap_or(1);
        byte_count *= elem_size;

        let mut total = byte_count.to_string();
        for extent in runtime {
            let product = self.b.fresh();
            self.b
                .emit(format!("{} = mul i64 {}, {}", product, total, extent));
            total = product;
        }

        let align = types::align_of(self.table(), cursor);
        let slot = self.b.fresh();
        self.b
            .emit(format!("{} = alloca i8, i64 {}, align {}", slot, total, align));
        self.slots[local.0 as usize] = Some(slot);
        Ok(())
    }

    fn emit_if(&mut self, cond: ExprId, then_stmt: StmtId, else_stmt: Option<StmtId>) -> Result<()> {
        let c = self.emit_bool(cond)?;
        let ctx = self.b.current_label().to_string();
        let then_block = self.b.add_block(&format!("{}.if", ctx));

        match else_stmt {
            Some(else_stmt) => {
                let else_block = self.b.add_block(&format!("{}.else", ctx));
                let end_block = self.b.add_block(&format!("{}.endif", ctx));
                self.b.cond_br(&c, then_block, else_block);

                self.b.position_at(then_block);
                self.emit_stmt(then_stmt)?;
                self.b.br(end_block);

                self.b.position_at(else_block);
                self.emit_stmt(else_stmt)?;
                self.b.br(end_block);

                self.b.position_at(end_block);
            }
            None => {
                let end_block = self.b.add_block(&format!("{}.endif", ctx));
                self.b.cond_br(&c, then_block, end_block);

                self.b.position_at(then_block);
                self.emit_stmt(then_stmt)?;
                self.b.br(end_block);

                self.b.position_at(end_block);
            }
        }
        Ok(())
    }

    fn emit_while(&mut self, cond: ExprId, body: StmtId) -> Result<()> {
        let cond_block = self.b.add_block("whilecond");
        let body_block = self.b.add_block("whilebody");
        let end_block = self.b.add_block("whileend");

        self.b.br(cond_block);
        self.b.position_at(cond_block);
        let c = self.emit_bool(cond)?;
        self.b.cond_br(&c, body_block, end_block);

        self.b.position_at(body_block);
        self.loops.push(LoopCtx {
            break_block: end_block,
            continue_block: cond_block,
            depth: self.scopes.len(),
        });
        let result = self.emit_stmt(body);
        self.loops.pop();
        result?;
        self.b.br(cond_block);

        self.b.position_at(end_block);
        Ok(())
    }

    fn emit_do_while(&mut self, body: StmtId, cond: ExprId) -> Result<()> {
        let body_block = self.b.add_block("dobody");
        let cond_block = self.b.add_block("docond");
        let end_block = self.b.add_block("doend");

        self.b.br(body_block);
        self.b.position_at(body_block);
        self.loops.push(LoopCtx {
            break_block: end_block,
            continue_block: cond_block,
            depth: self.scopes.len(),
        });
        let result = self.emit_stmt(body);
        self.loops.pop();
        result?;
        self.b.br(cond_block);

        self.b.position_at(cond_block);
        let c = self.emit_bool(cond)?;
        self.b.cond_br(&c, body_block, end_block);

        self.b.position_at(end_block);
        Ok(())
    }

    fn emit_for(
        &mut self,
        init: Option<&ForInit>,
        cond: Option<ExprId>,
        step: Option<ExprId>,
        body: StmtId,
    ) -> Result<()> {
        // The for header's declaration scope encloses the whole loop.
        self.scopes.push(None);
        let result = self.emit_for_inner(init, cond, step, body);
        self.restore_scope_on_fallthrough();
        self.scopes.pop();
        result
    }

    fn emit_for_inner(
        &mut self,
        init: Option<&ForInit>,
        cond: Option<ExprId>,
        step: Option<ExprId>,
        body: StmtId,
    ) -> Result<()> {
        match init {
            None => {}
            Some(ForInit::Expr(e)) => {
                self.emit_expr(*e)?;
            }
            Some(ForInit::Decls(decls)) => {
                for &d in decls {
                    self.emit_stmt(d)?;
                }
            }
        }

        let cond_block = self.b.add_block("forcond");
        let body_block = self.b.add_block("forbody");
        let step_block = step.map(|_| self.b.add_block("forstep"));
        let end_block = self.b.add_block("forend");

        self.b.br(cond_block);
        self.b.position_at(cond_block);
        match cond {
            // A missing controlling expression is replaced by a nonzero
            // constant (6.8.5.3p2).
            None => self.b.br(body_block),
            Some(c) => {
                let c = self.emit_bool(c)?;
                self.b.cond_br(&c, body_block, end_block);
            }
        }

        self.b.position_at(body_block);
        self.loops.push(LoopCtx {
            break_block: end_block,
            continue_block: step_block.unwrap_or(cond_block),
            depth: self.scopes.len(),
        });
        let result = self.emit_stmt(body);
        self.loops.pop();
        result?;
        self.b.br(step_block.unwrap_or(cond_block));

        if let (Some(step_block), Some(step)) = (step_block, step) {
            self.b.position_at(step_block);
            self.emit_expr(step)?;
            self.b.br(cond_block);
        }

        self.b.position_at(end_block);
        Ok(())
    }

    fn emit_return(&mut self, value: Option<ExprId>, span: Span) -> Result<()> {
        match value {
            None => {
                self.restore_vla_saves_above(0);
                self.b.ret("ret void".to_string());
            }
            Some(e) => {
                let v = self.emit_rvalue(e)?;
                let v = self.convert(v, self.f.ret).map_err(|mut err| {
                    err.span = span;
                    err
                })?;
                self.restore_vla_saves_above(0);
                let ll = self.ll(self.f.ret);
                self.b.ret(format!("ret {} {}", ll, v.name));
            }
        }
        Ok(())
    }

    // === Expressions ===

    fn emit_rvalue(&mut self, e: ExprId) -> Result<EVal> {
        let v = self.emit_expr(e)?;
        Ok(self.load_if_lvalue(v))
    }

    fn load_if_lvalue(&mut self, v: EVal) -> EVal {
        if !v.lvalue {
            return v;
        }
        let ll = self.ll(v.ty);
        let align = self.align(v.ty);
        let name = self.b.fresh();
        self.b.emit(format!(
            "{} = load {}, ptr {}, align {}",
            name, ll, v.name, align
        ));
        EVal {
            name,
            ty: v.ty,
            lvalue: false,
        }
    }

    /// Convert an rvalue between arithmetic types through the snippet
    /// catalogue; identity conversions are elided.
    fn convert(&mut self, v: EVal, to: TypeId) -> Result<EVal> {
        if v.ty == to {
            return Ok(v);
        }
        let symbol = snippets::snippet_symbol("cnv", &[self.c_name(to), self.c_name(v.ty)]);
        let name = self.call_snippet(&symbol, to, &[&v])?;
        Ok(EVal {
            name,
            ty: to,
            lvalue: false,
        })
    }

    /// Look up and call a snippet; the caller passes already-converted
    /// operands. Returns the result value name.
    fn call_snippet(&mut self, symbol: &str, ret: TypeId, args: &[&EVal]) -> Result<String> {
        if SnippetRegistry::global().lookup(symbol).is_none() {
            return Err(self.err(
                Span::dummy(),
                format!("no operation `{}` in the snippet library", symbol),
            ));
        }
        self.b.used_snippets.insert(symbol.to_string());
        let rendered: Vec<String> = args
            .iter()
            .map(|a| format!("{} {}", param_type_str(self.table(), a.ty), a.name))
            .collect();
        let name = self.b.fresh();
        let ret_ll = ret_type_str(self.table(), ret);
        self.b.emit(format!(
            "{} = call {} @{}({})",
            name,
            ret_ll,
            symbol,
            rendered.join(", ")
        ));
        Ok(name)
    }

    /// Boolean test: an `i1` that is true iff the expression is nonzero.
    fn emit_bool(&mut self, e: ExprId) -> Result<String> {
        let v = self.emit_rvalue(e)?;
        if *self.table().get(v.ty) == CType::Bool {
            return Ok(v.name);
        }
        let symbol = snippets::snippet_symbol("cnv", &["_Bool", self.c_name(v.ty)]);
        self.call_snippet(&symbol, self.table().bool_(), &[&v])
    }

    /// Widen an integer value to i64 for address arithmetic. Decimal
    /// literals are already valid i64 operands.
    fn widen_to_i64(&mut self, v: &EVal) -> String {
        let ll = self.ll(v.ty);
        if ll == "i64" || v.name.bytes().all(|b| b.is_ascii_digit()) {
            return v.name.clone();
        }
        let inst = if types::is_signed_integer(self.table(), v.ty) {
            "sext"
        } else {
            "zext"
        };
        let name = self.b.fresh();
        self.b
            .emit(format!("{} = {} {} {} to i64", name, inst, ll, v.name));
        name
    }

    /// Size in bytes of one element of type `ty`, as an i64 operand.
    /// Runtime for element types with VLA extents.
    fn stride_of(&mut self, ty: TypeId, span: Span) -> Result<String> {
        if let Some(size) = types::size_of(self.table(), ty) {
            return Ok(size.to_string());
        }
        match *self.table().get(ty) {
            CType::Array { element, extent } => {
                let inner = self.stride_of(element, span)?;
                let extent_value = match extent {
                    ArrayExtent::Variable(e) => {
                        self.vla_extents.get(&e).cloned().ok_or_else(|| {
                            self.err(span, "VLA extent used before its declaration")
                        })?
                    }
                    ArrayExtent::Fixed(n) => n.to_string(),
                    ArrayExtent::Incomplete => {
                        return Err(self.err(span, "subscript on an incomplete array type"))
                    }
                };
                let product = self.b.fresh();
                self.b.emit(format!(
                    "{} = mul i64 {}, {}",
                    product, extent_value, inner
                ));
                Ok(product)
            }
            _ => Err(self.err(span, "sizeless element type")),
        }
    }

    fn emit_expr(&mut self, e: ExprId) -> Result<EVal> {
        let expr = self.tu.expr(e);
        let span = expr.span;
        let ty = expr.ty;
        match &expr.kind {
            ExprKind::IntLit(v) => Ok(EVal {
                name: v.to_string(),
                ty,
                lvalue: false,
            }),
            ExprKind::FloatLit(v) => Ok(EVal {
                name: float_literal(self.table(), ty, *v),
                ty,
                lvalue: false,
            }),
            ExprKind::Local(local) => {
                let slot = self.slots[local.0 as usize]
                    .clone()
                    .expect("slot exists before use");
                Ok(EVal {
                    name: slot,
                    ty,
                    lvalue: true,
                })
            }
            ExprKind::FuncRef(_) => {
                Err(self.err(span, "function designators are only callable"))
            }
            ExprKind::Index { base, index } => self.emit_index(*base, *index, ty, span),
            ExprKind::Member {
                base,
                field,
                through_pointer,
            } => self.emit_member(*base, *field, *through_pointer, ty),
            ExprKind::Unary { op, operand } => self.emit_unary(*op, *operand, ty),
            ExprKind::Binary { op, lhs, rhs } => self.emit_binary(*op, *lhs, *rhs, ty),
            ExprKind::Logical { op, lhs, rhs } => self.emit_logical(*op, *lhs, *rhs),
            ExprKind::Assign { op, lhs, rhs } => self.emit_assign(*op, *lhs, *rhs),
            ExprKind::IncDec {
                prefix,
                increment,
                operand,
            } => self.emit_incdec(*prefix, *increment, *operand),
            ExprKind::Cast(operand) => {
                let v = self.emit_rvalue(*operand)?;
                if ty == self.table().void() {
                    return Ok(EVal {
                        name: String::new(),
                        ty,
                        lvalue: false,
                    });
                }
                self.convert(v, ty)
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => self.emit_conditional(*cond, *then_expr, *else_expr, ty),
            ExprKind::Comma { lhs, rhs } => {
                self.emit_expr(*lhs)?;
                self.emit_rvalue(*rhs)
            }
            ExprKind::Call { func, args } => self.emit_call(*func, args),
            ExprKind::CompoundLiteral { local, inits } => {
                self.emit_compound_literal(*local, inits, ty, span)
            }
        }
    }

    fn emit_index(&mut self, base: ExprId, index: ExprId, elem_ty: TypeId, span: Span) -> Result<EVal> {
        let base_v = self.emit_expr(base)?;
        let base_ptr = match self.table().get(base_v.ty) {
            CType::Array { .. } => base_v.name.clone(),
            CType::Pointer(_) => self.load_if_lvalue(base_v).name,
            _ => return Err(self.err(span, "subscript on a non-array value")),
        };

        let idx = self.emit_rvalue(index)?;
        let idx = self.widen_to_i64(&idx);
        let stride = self.stride_of(elem_ty, span)?;

        let offset = self.b.fresh();
        self.b
            .emit(format!("{} = mul i64 {}, {}", offset, idx, stride));
        let addr = self.b.fresh();
        self.b.emit(format!(
            "{} = getelementptr inbounds i8, ptr {}, i64 {}",
            addr, base_ptr, offset
        ));
        Ok(EVal {
            name: addr,
            ty: elem_ty,
            lvalue: true,
        })
    }

    fn emit_member(
        &mut self,
        base: ExprId,
        field: u32,
        through_pointer: bool,
        field_ty: TypeId,
    ) -> Result<EVal> {
        let base_v = self.emit_expr(base)?;
        let struct_id = match self.table().get(base_v.ty) {
            CType::Struct(s) => *s,
            CType::Pointer(p) => match self.table().get(*p) {
                CType::Struct(s) => *s,
                _ => unreachable!("sema checked member access"),
            },
            _ => unreachable!("sema checked member access"),
        };
        let base_ptr = if through_pointer {
            self.load_if_lvalue(base_v).name
        } else {
            base_v.name
        };
        let offset = self.table().struct_def(struct_id).fields[field as usize].offset;

        let addr = if offset == 0 {
            base_ptr
        } else {
            let addr = self.b.fresh();
            self.b.emit(format!(
                "{} = getelementptr inbounds i8, ptr {}, i64 {}",
                addr, base_ptr, offset
            ));
            addr
        };
        Ok(EVal {
            name: addr,
            ty: field_ty,
            lvalue: true,
        })
    }

    fn emit_unary(&mut self, op: UnOp, operand: ExprId, result_ty: TypeId) -> Result<EVal> {
        let v = self.emit_rvalue(operand)?;
        match op {
            UnOp::Plus => self.convert(v, result_ty),
            UnOp::Neg | UnOp::BitNot => {
                let v = self.convert(v, result_ty)?;
                let op_name = op.snippet_name().unwrap();
                let symbol =
                    snippets::snippet_symbol(op_name, &[self.c_name(result_ty); 2]);
                let name = self.call_snippet(&symbol, result_ty, &[&v])?;
                Ok(EVal {
                    name,
                    ty: result_ty,
                    lvalue: false,
                })
            }
            UnOp::Not => {
                let symbol = snippets::snippet_symbol("not", &["int", self.c_name(v.ty)]);
                let name = self.call_snippet(&symbol, result_ty, &[&v])?;
                Ok(EVal {
                    name,
                    ty: result_ty,
                    lvalue: false,
                })
            }
        }
    }

    /// The operand type both sides convert to before the snippet call.
    fn binary_common_type(&self, op: BinOp, lhs: TypeId, rhs: TypeId, result: TypeId) -> TypeId {
        if op.is_relational() {
            types::usual_arithmetic(self.table(), lhs, rhs)
        } else {
            // For shifts the result type is the promoted left operand and
            // the right operand is brought to it as well; for everything
            // else the result type already is the common type.
            result
        }
    }

    fn emit_binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId, result_ty: TypeId) -> Result<EVal> {
        let lv = self.emit_rvalue(lhs)?;
        let rv = self.emit_rvalue(rhs)?;
        let common = self.binary_common_type(op, lv.ty, rv.ty, result_ty);
        let lv = self.convert(lv, common)?;
        let rv = self.convert(rv, common)?;

        let result_name = if op.is_relational() {
            "int"
        } else {
            self.c_name(result_ty)
        };
        let common_name = self.c_name(common);
        let symbol =
            snippets::snippet_symbol(op.snippet_name(), &[result_name, common_name, common_name]);
        let name = self.call_snippet(&symbol, result_ty, &[&lv, &rv])?;
        Ok(EVal {
            name,
            ty: result_ty,
            lvalue: false,
        })
    }

    /// Short-circuit `&&` / `||`: a fresh slot seeded with the
    /// short-circuit value, overwritten with the boolean of the right
    /// operand when it is evaluated.
    fn emit_logical(&mut self, op: LogicalOp, lhs: ExprId, rhs: ExprId) -> Result<EVal> {
        let int = self.table().int_();
        let slot = self.b.emit_entry_alloca("i32", 4);

        let l = self.emit_bool(lhs)?;
        let (prefix, seed) = match op {
            LogicalOp::And => ("land", "0"),
            LogicalOp::Or => ("lor", "1"),
        };
        self.b
            .emit(format!("store i32 {}, ptr {}, align 4", seed, slot));

        let rhs_block = self.b.add_block(&format!("{}.rhs", prefix));
        let end_block = self.b.add_block(&format!("{}.end", prefix));
        match op {
            LogicalOp::And => self.b.cond_br(&l, rhs_block, end_block),
            LogicalOp::Or => self.b.cond_br(&l, end_block, rhs_block),
        }

        self.b.position_at(rhs_block);
        let r = self.emit_bool(rhs)?;
        let widened = self.b.fresh();
        self.b
            .emit(format!("{} = zext i1 {} to i32", widened, r));
        self.b
            .emit(format!("store i32 {}, ptr {}, align 4", widened, slot));
        self.b.br(end_block);

        self.b.position_at(end_block);
        let name = self.b.fresh();
        self.b
            .emit(format!("{} = load i32, ptr {}, align 4", name, slot));
        Ok(EVal {
            name,
            ty: int,
            lvalue: false,
        })
    }

    fn emit_assign(&mut self, op: Option<BinOp>, lhs: ExprId, rhs: ExprId) -> Result<EVal> {
        let target = self.emit_expr(lhs)?;
        debug_assert!(target.lvalue, "sema checked the assignment target");
        let target_ty = target.ty;

        let value = match op {
            None => {
                let rv = self.emit_rvalue(rhs)?;
                self.convert(rv, target_ty)?
            }
            Some(binop) => {
                // Compound assignment evaluates the target address once.
                let current = self.load_if_lvalue(target.clone());
                let rv = self.emit_rvalue(rhs)?;
                let result_ty = if matches!(binop, BinOp::Shl | BinOp::Shr) {
                    types::promote_integer(self.table(), current.ty)
                } else {
                    types::usual_arithmetic(self.table(), current.ty, rv.ty)
                };
                let common = self.binary_common_type(binop, current.ty, rv.ty, result_ty);
                let l = self.convert(current, common)?;
                let r = self.convert(rv, common)?;
                let result_name = if binop.is_relational() {
                    "int"
                } else {
                    self.c_name(result_ty)
                };
                let common_name = self.c_name(common);
                let symbol = snippets::snippet_symbol(
                    binop.snippet_name(),
                    &[result_name, common_name, common_name],
                );
                let name = self.call_snippet(&symbol, result_ty, &[&l, &r])?;
                let result = EVal {
                    name,
                    ty: result_ty,
                    lvalue: false,
                };
                self.convert(result, target_ty)?
            }
        };

        let ll = self.ll(target_ty);
        let align = self.align(target_ty);
        self.b.emit(format!(
            "store {} {}, ptr {}, align {}",
            ll, value.name, target.name, align
        ));
        Ok(value)
    }

    fn emit_incdec(&mut self, prefix: bool, increment: bool, operand: ExprId) -> Result<EVal> {
        let target = self.emit_expr(operand)?;
        let ty = target.ty;
        let original = self.load_if_lvalue(target.clone());

        let int = self.table().int_();
        let common = types::usual_arithmetic(self.table(), ty, int);
        let widened = self.convert(original.clone(), common)?;
        let one = if types::is_floating(self.table(), common) {
            float_literal(self.table(), common, 1.0)
        } else {
            "1".to_string()
        };
        let one = EVal {
            name: one,
            ty: common,
            lvalue: false,
        };
        let op = if increment { "add" } else { "sub" };
        let symbol = snippets::snippet_symbol(op, &[self.c_name(common); 3]);
        let name = self.call_snippet(&symbol, common, &[&widened, &one])?;
        let new_value = self.convert(
            EVal {
                name,
                ty: common,
                lvalue: false,
            },
            ty,
        )?;

        let ll = self.ll(ty);
        let align = self.align(ty);
        self.b.emit(format!(
            "store {} {}, ptr {}, align {}",
            ll, new_value.name, target.name, align
        ));
        Ok(if prefix { new_value } else { original })
    }

    fn emit_conditional(
        &mut self,
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
        result_ty: TypeId,
    ) -> Result<EVal> {
        let ll = self.ll(result_ty);
        let align = self.align(result_ty);
        let slot = self.b.emit_entry_alloca(&ll, align);

        let c = self.emit_bool(cond)?;
        let ctx = self.b.current_label().to_string();
        let then_block = self.b.add_block(&format!("{}.if", ctx));
        let else_block = self.b.add_block(&format!("{}.else", ctx));
        let end_block = self.b.add_block(&format!("{}.endif", ctx));
        self.b.cond_br(&c, then_block, else_block);

        self.b.position_at(then_block);
        let tv = self.emit_rvalue(then_expr)?;
        let tv = self.convert(tv, result_ty)?;
        self.b.emit(format!(
            "store {} {}, ptr {}, align {}",
            ll, tv.name, slot, align
        ));
        self.b.br(end_block);

        self.b.position_at(else_block);
        let ev = self.emit_rvalue(else_expr)?;
        let ev = self.convert(ev, result_ty)?;
        self.b.emit(format!(
            "store {} {}, ptr {}, align {}",
            ll, ev.name, slot, align
        ));
        self.b.br(end_block);

        self.b.position_at(end_block);
        let name = self.b.fresh();
        self.b.emit(format!(
            "{} = load {}, ptr {}, align {}",
            name, ll, slot, align
        ));
        Ok(EVal {
            name,
            ty: result_ty,
            lvalue: false,
        })
    }

    fn emit_call(&mut self, func: ecc_ast::FuncId, args: &[ExprId]) -> Result<EVal> {
        let callee = &self.tu.functions[func.0 as usize];
        let param_types = callee.param_types.clone();
        let callee_name = callee.name.clone();
        let ret = callee.ret;

        let mut rendered = Vec::with_capacity(args.len());
        for (&arg, &param_ty) in args.iter().zip(&param_types) {
            let value = if types::is_arithmetic(self.table(), param_ty) {
                let v = self.emit_rvalue(arg)?;
                self.convert(v, param_ty)?
            } else {
                // Pointer parameter: arrays pass their address, pointers
                // pass their value.
                let v = self.emit_expr(arg)?;
                match self.table().get(v.ty) {
                    CType::Array { .. } => EVal {
                        name: v.name.clone(),
                        ty: param_ty,
                        lvalue: false,
                    },
                    _ => {
                        let loaded = self.load_if_lvalue(v);
                        EVal {
                            name: loaded.name,
                            ty: param_ty,
                            lvalue: false,
                        }
                    }
                }
            };
            rendered.push(format!(
                "{} {}",
                param_type_str(self.table(), param_ty),
                value.name
            ));
        }

        if ret == self.table().void() {
            self.b
                .emit(format!("call void @{}({})", callee_name, rendered.join(", ")));
            Ok(EVal {
                name: String::new(),
                ty: ret,
                lvalue: false,
            })
        } else {
            let name = self.b.fresh();
            self.b.emit(format!(
                "{} = call {} @{}({})",
                name,
                ret_type_str(self.table(), ret),
                callee_name,
                rendered.join(", ")
            ));
            Ok(EVal {
                name,
                ty: ret,
                lvalue: false,
            })
        }
    }

    fn emit_compound_literal(
        &mut self,
        local: LocalId,
        inits: &[ExprId],
        ty: TypeId,
        span: Span,
    ) -> Result<EVal> {
        if self.slots[local.0 as usize].is_none() {
            let ll = self.ll(ty);
            let align = self.align(ty);
            let slot = self.b.emit_entry_alloca(&ll, align);
            self.slots[local.0 as usize] = Some(slot);
        }
        let slot = self.slots[local.0 as usize].clone().unwrap();

        let elements: Vec<(TypeId, u64)> = match self.table().get(ty) {
            CType::Struct(s) => self
                .table()
                .struct_def(*s)
                .fields
                .iter()
                .map(|f| (f.ty, f.offset))
                .collect(),
            CType::Array {
                element,
                extent: ArrayExtent::Fixed(n),
            } => {
                let elem = *element;
                let size = types::size_of(self.table(), elem)
                    .ok_or_else(|| self.err(span, "sizeless array element"))?;
                (0..*n).map(|i| (elem, i * size)).collect()
            }
            _ => return Err(self.err(span, "unsupported compound literal type")),
        };

        for (&init, (elem_ty, offset)) in inits.iter().zip(elements) {
            let v = self.emit_rvalue(init)?;
            let v = self.convert(v, elem_ty)?;
            let addr = if offset == 0 {
                slot.clone()
            } else {
                let addr = self.b.fresh();
                self.b.emit(format!(
                    "{} = getelementptr inbounds i8, ptr {}, i64 {}",
                    addr, slot, offset
                ));
                addr
            };
            let ll = self.ll(elem_ty);
            let align = self.align(elem_ty);
            self.b.emit(format!(
                "store {} {}, ptr {}, align {}",
                ll, v.name, addr, align
            ));
        }
        Ok(EVal {
            name: slot,
            ty,
            lvalue: true,
        })
    }
}
