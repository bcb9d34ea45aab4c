//! Expression typing and lowering.
//!
//! Every lowered expression carries its C type and its value category.
//! Operator nodes get the type the usual arithmetic conversions prescribe;
//! the IR emitter re-derives the operand conversions from the operand and
//! result types, so no conversion nodes are materialized here.

use ecc_ast::expr::{BinOp, LogicalOp, UnOp};
use ecc_ast::{
    ArrayExtent, CType, Expr, ExprId, ExprKind, Local, LocalId, Span, TypeId, ValueCategory,
};
use ecc_lexer::TokenKind;
use ecc_parser::{PChild, PNodeId};
use ecc_types as types;

use crate::constants;
use crate::lower::Sema;
use crate::scope::Binding;
use crate::{SemaError, SemaErrorKind};

type Result<T> = std::result::Result<T, SemaError>;

impl Sema<'_> {
    pub(crate) fn add_expr(
        &mut self,
        kind: ExprKind,
        span: Span,
        ty: TypeId,
        category: ValueCategory,
    ) -> ExprId {
        self.tu.add_expr(Expr {
            kind,
            span,
            ty,
            category,
        })
    }

    /// Lower an expression and require it usable as a branch condition.
    pub(crate) fn lower_condition(&mut self, id: PNodeId) -> Result<ExprId> {
        let expr = self.lower_expr(id)?;
        let ty = self.tu.expr(expr).ty;
        if types::is_arithmetic(&self.tu.types, ty) {
            Ok(expr)
        } else if matches!(self.tu.types.get(ty), CType::Pointer(_)) {
            Err(self.unsupported(id, "pointer conditions are not supported"))
        } else {
            Err(self.type_error(id, "condition must have arithmetic type"))
        }
    }

    pub(crate) fn lower_expr(&mut self, id: PNodeId) -> Result<ExprId> {
        let id = self.shrink(id);
        let span = self.span(id);
        match self.rule(id) {
            "primary-expression" => self.lower_primary(id, span),
            "postfix-expression" => self.lower_postfix(id, span),
            "unary-expression" => self.lower_unary(id, span),
            "cast-expression" => self.lower_cast(id, span),
            "multiplicative-expression"
            | "additive-expression"
            | "shift-expression"
            | "relational-expression"
            | "equality-expression"
            | "AND-expression"
            | "exclusive-OR-expression"
            | "inclusive-OR-expression" => self.lower_binary(id, span),
            "logical-AND-expression" | "logical-OR-expression" => self.lower_logical(id, span),
            "conditional-expression" => self.lower_conditional(id, span),
            "assignment-expression" => self.lower_assignment(id, span),
            "expression" => self.lower_comma(id, span),
            other => Err(self.unsupported(id, &format!("unsupported expression `{}`", other))),
        }
    }

    // === Primary ===

    fn lower_primary(&mut self, id: PNodeId, span: Span) -> Result<ExprId> {
        let children = self.children(id).to_vec();
        if children.len() == 3 {
            // `( expression )` — transparent, including the value category.
            if let PChild::Node(inner) = children[1] {
                return self.lower_expr(inner);
            }
        }
        let token = match children[0] {
            PChild::Token(t) => t,
            PChild::Node(_) => return Err(self.unsupported(id, "malformed primary expression")),
        };
        match self.token_kind(token) {
            TokenKind::Identifier => self.lower_identifier(token, span),
            TokenKind::IntConstant => {
                let (value, ty) =
                    constants::type_integer_constant(&self.tu.types, self.token_text(token))
                        .map_err(|m| self.type_error(id, m))?;
                Ok(self.add_expr(ExprKind::IntLit(value), span, ty, ValueCategory::RValue))
            }
            TokenKind::FloatConstant => {
                let (value, ty) =
                    constants::type_floating_constant(&self.tu.types, self.token_text(token))
                        .map_err(|m| self.type_error(id, m))?;
                Ok(self.add_expr(ExprKind::FloatLit(value), span, ty, ValueCategory::RValue))
            }
            TokenKind::CharConstant => {
                let value = ecc_lexer::char_constant_value(self.token_text(token))
                    .map_err(|m| self.type_error(id, m))?;
                let int = self.tu.types.int_();
                Ok(self.add_expr(
                    ExprKind::IntLit(value as u64),
                    span,
                    int,
                    ValueCategory::RValue,
                ))
            }
            TokenKind::StringLiteral => {
                Err(self.unsupported(id, "string literals are not supported"))
            }
            _ => Err(self.unsupported(id, "malformed primary expression")),
        }
    }

    fn lower_identifier(&mut self, token: u32, span: Span) -> Result<ExprId> {
        let name = self.token_text(token).to_string();
        match self.scopes.resolve(&name) {
            Some(Binding::Local(local)) => {
                let ty = self.local_type(local);
                Ok(self.add_expr(ExprKind::Local(local), span, ty, ValueCategory::LValue))
            }
            Some(Binding::Func(func)) => {
                let f = &self.tu.functions[func.0 as usize];
                let (ret, params) = (f.ret, self.func_param_types(func).to_vec());
                let ty = self.tu.types.intern(CType::Function {
                    ret,
                    params,
                    variadic: false,
                });
                Ok(self.add_expr(ExprKind::FuncRef(func), span, ty, ValueCategory::RValue))
            }
            None => Err(SemaError::new(
                SemaErrorKind::UndeclaredIdentifier,
                span,
                format!("`{}` is not declared", name),
            )),
        }
    }

    fn local_type(&self, local: LocalId) -> TypeId {
        self.cur_locals[local.0 as usize].ty
    }

    // === Postfix ===

    fn lower_postfix(&mut self, id: PNodeId, span: Span) -> Result<ExprId> {
        let children = self.children(id).to_vec();

        // Compound literal: `( type-name ) { initializer-list }`.
        if let PChild::Token(t) = children[0] {
            if self.token_text(t) == "(" {
                return self.lower_compound_literal(id, span);
            }
        }

        let base_node = match children[0] {
            PChild::Node(n) => n,
            PChild::Token(_) => return Err(self.unsupported(id, "malformed postfix expression")),
        };
        let op = match children[1] {
            PChild::Token(t) => self.token_text(t).to_string(),
            PChild::Node(_) => return Err(self.unsupported(id, "malformed postfix expression")),
        };

        match op.as_str() {
            "[" => {
                let base = self.lower_expr(base_node)?;
                let index_node = self.child_nodes(id)[1];
                let index = self.lower_expr(index_node)?;
                let index_ty = self.tu.expr(index).ty;
                if !types::is_integer(&self.tu.types, index_ty) {
                    return Err(self.type_error(index_node, "array subscript must be an integer"));
                }
                let base_ty = self.tu.expr(base).ty;
                let element = match self.tu.types.get(base_ty) {
                    CType::Array { element, .. } => *element,
                    CType::Pointer(pointee) => *pointee,
                    _ => {
                        return Err(
                            self.type_error(id, "subscripted value is not an array or pointer")
                        )
                    }
                };
                Ok(self.add_expr(
                    ExprKind::Index { base, index },
                    span,
                    element,
                    ValueCategory::LValue,
                ))
            }
            "(" => self.lower_call(id, base_node, span),
            "." | "->" => {
                let through_pointer = op == "->";
                let base = self.lower_expr(base_node)?;
                let base_ty = self.tu.expr(base).ty;
                let struct_id = match (self.tu.types.get(base_ty), through_pointer) {
                    (CType::Struct(s), false) => *s,
                    (CType::Pointer(p), true) => match self.tu.types.get(*p) {
                        CType::Struct(s) => *s,
                        _ => return Err(self.type_error(id, "`->` on a non-struct pointer")),
                    },
                    (_, false) => return Err(self.type_error(id, "`.` on a non-struct value")),
                    (_, true) => return Err(self.type_error(id, "`->` on a non-pointer value")),
                };
                if !through_pointer && self.tu.expr(base).category != ValueCategory::LValue {
                    return Err(SemaError::new(
                        SemaErrorKind::NotAnLvalue,
                        span,
                        "member access needs an object",
                    ));
                }
                let field_token = match children[2] {
                    PChild::Token(t) => t,
                    PChild::Node(_) => return Err(self.unsupported(id, "malformed member access")),
                };
                let field_name = self.token_text(field_token).to_string();
                let def = self.tu.types.struct_def(struct_id);
                let (field, field_ty) = match def.field(&field_name) {
                    Some((i, f)) => (i, f.ty),
                    None => {
                        return Err(self.type_error(
                            id,
                            format!("no member `{}` in struct", field_name),
                        ))
                    }
                };
                Ok(self.add_expr(
                    ExprKind::Member {
                        base,
                        field,
                        through_pointer,
                    },
                    span,
                    field_ty,
                    ValueCategory::LValue,
                ))
            }
            "++" | "--" => {
                let operand = self.lower_expr(base_node)?;
                self.check_incdec_operand(id, operand)?;
                let ty = self.tu.expr(operand).ty;
                Ok(self.add_expr(
                    ExprKind::IncDec {
                        prefix: false,
                        increment: op == "++",
                        operand,
                    },
                    span,
                    ty,
                    ValueCategory::RValue,
                ))
            }
            other => Err(self.unsupported(id, &format!("unsupported postfix `{}`", other))),
        }
    }

    fn lower_call(&mut self, id: PNodeId, callee_node: PNodeId, span: Span) -> Result<ExprId> {
        let callee = self.lower_expr(callee_node)?;
        let func = match self.tu.expr(callee).kind {
            ExprKind::FuncRef(f) => f,
            _ => return Err(self.unsupported(id, "only direct calls of named functions are supported")),
        };

        let arg_nodes: Vec<PNodeId> = match self.child_nodes(id).get(1) {
            None => Vec::new(),
            Some(&args) => self.list(args, "argument-expression-list"),
        };

        let param_types = self.func_param_types(func).to_vec();
        if arg_nodes.len() != param_types.len() {
            return Err(self.type_error(
                id,
                format!(
                    "`{}` expects {} arguments, got {}",
                    self.tu.functions[func.0 as usize].name,
                    param_types.len(),
                    arg_nodes.len()
                ),
            ));
        }

        let mut args = Vec::with_capacity(arg_nodes.len());
        for (&param_ty, &arg_node) in param_types.iter().zip(&arg_nodes) {
            let arg = self.lower_expr(arg_node)?;
            let arg_ty = self.tu.expr(arg).ty;
            let ok = if types::is_arithmetic(&self.tu.types, param_ty) {
                types::is_arithmetic(&self.tu.types, arg_ty)
            } else {
                // Pointer parameter: the argument decays to it.
                types::decay(&mut self.tu.types, arg_ty) == param_ty
            };
            if !ok {
                return Err(self.type_error(arg_node, "argument has no conversion to parameter type"));
            }
            args.push(arg);
        }

        let ret = self.tu.functions[func.0 as usize].ret;
        Ok(self.add_expr(
            ExprKind::Call { func, args },
            span,
            ret,
            ValueCategory::RValue,
        ))
    }

    fn lower_compound_literal(&mut self, id: PNodeId, span: Span) -> Result<ExprId> {
        let kids = self.child_nodes(id);
        let ty = self.lower_type_name(kids[0])?;
        let list = kids
            .get(1)
            .copied()
            .ok_or_else(|| self.type_error(id, "compound literal has no initializers"))?;

        let element_types: Vec<TypeId> = match self.tu.types.get(ty) {
            CType::Struct(s) => self
                .tu
                .types
                .struct_def(*s)
                .fields
                .iter()
                .map(|f| f.ty)
                .collect(),
            CType::Array {
                element,
                extent: ArrayExtent::Fixed(n),
            } => vec![*element; *n as usize],
            _ => {
                return Err(
                    self.unsupported(id, "compound literals need a struct or fixed array type")
                )
            }
        };

        let mut inits = Vec::new();
        for init in self.list(list, "initializer-list") {
            let init = self.shrink(init);
            if self.rule(init) == "designation" {
                return Err(self.unsupported(init, "designated initializers are not supported"));
            }
            if self.rule(init) == "initializer" {
                return Err(self.unsupported(init, "nested braced initializers are not supported"));
            }
            inits.push(self.lower_expr(init)?);
        }
        if inits.len() > element_types.len() {
            return Err(self.type_error(id, "too many initializers"));
        }
        for (&init, &ety) in inits.iter().zip(&element_types) {
            let ity = self.tu.expr(init).ty;
            if !types::is_arithmetic(&self.tu.types, ity)
                || !types::is_arithmetic(&self.tu.types, ety)
            {
                return Err(self.type_error(id, "unsupported initializer type"));
            }
        }

        let local = LocalId(self.cur_locals.len() as u32);
        self.cur_locals.push(Local {
            name: String::new(),
            ty,
            span,
            is_param: false,
        });
        Ok(self.add_expr(
            ExprKind::CompoundLiteral { local, inits },
            span,
            ty,
            ValueCategory::LValue,
        ))
    }

    // === Unary, cast ===

    fn lower_unary(&mut self, id: PNodeId, span: Span) -> Result<ExprId> {
        let children = self.children(id).to_vec();

        if let PChild::Token(t) = children[0] {
            let text = self.token_text(t).to_string();
            match text.as_str() {
                "++" | "--" => {
                    let operand_node = self.child_nodes(id)[0];
                    let operand = self.lower_expr(operand_node)?;
                    self.check_incdec_operand(id, operand)?;
                    let ty = self.tu.expr(operand).ty;
                    return Ok(self.add_expr(
                        ExprKind::IncDec {
                            prefix: true,
                            increment: text == "++",
                            operand,
                        },
                        span,
                        ty,
                        ValueCategory::RValue,
                    ));
                }
                "sizeof" => return Err(self.unsupported(id, "sizeof is not supported")),
                _ => return Err(self.unsupported(id, "malformed unary expression")),
            }
        }

        // `unary-operator cast-expression`.
        let op_node = self.child_nodes(id)[0];
        let operand_node = self.child_nodes(id)[1];
        let op_text = self.child_tokens(op_node)[0].to_string();
        let op = match op_text.as_str() {
            "+" => UnOp::Plus,
            "-" => UnOp::Neg,
            "~" => UnOp::BitNot,
            "!" => UnOp::Not,
            "&" => return Err(self.unsupported(id, "the address-of operator is not supported")),
            "*" => return Err(self.unsupported(id, "pointer dereference is not supported")),
            other => return Err(self.unsupported(id, &format!("unsupported operator `{}`", other))),
        };

        let operand = self.lower_expr(operand_node)?;
        let operand_ty = self.tu.expr(operand).ty;
        let table = &self.tu.types;
        let ty = match op {
            UnOp::Plus | UnOp::Neg => {
                if !types::is_arithmetic(table, operand_ty) {
                    return Err(self.type_error(id, "operand must have arithmetic type"));
                }
                types::promote_integer(table, operand_ty)
            }
            UnOp::BitNot => {
                if !types::is_integer(table, operand_ty) {
                    return Err(self.type_error(id, "operand of `~` must be an integer"));
                }
                types::promote_integer(table, operand_ty)
            }
            UnOp::Not => {
                if !types::is_arithmetic(table, operand_ty) {
                    return Err(self.type_error(id, "operand of `!` must be scalar"));
                }
                table.int_()
            }
        };
        Ok(self.add_expr(
            ExprKind::Unary { op, operand },
            span,
            ty,
            ValueCategory::RValue,
        ))
    }

    fn lower_cast(&mut self, id: PNodeId, span: Span) -> Result<ExprId> {
        let kids = self.child_nodes(id);
        let to = self.lower_type_name(kids[0])?;
        let operand = self.lower_expr(kids[1])?;
        let operand_ty = self.tu.expr(operand).ty;

        let table = &self.tu.types;
        let to_ok = to == table.void() || types::is_arithmetic(table, to);
        if !to_ok {
            return Err(self.unsupported(id, "casts to non-arithmetic types are not supported"));
        }
        if to != table.void() && !types::is_arithmetic(table, operand_ty) {
            return Err(self.type_error(id, "cast operand must have arithmetic type"));
        }
        Ok(self.add_expr(ExprKind::Cast(operand), span, to, ValueCategory::RValue))
    }

    fn check_incdec_operand(&self, id: PNodeId, operand: ExprId) -> Result<()> {
        let e = self.tu.expr(operand);
        if e.category != ValueCategory::LValue {
            return Err(SemaError::new(
                SemaErrorKind::NotAnLvalue,
                self.span(id),
                "operand of `++`/`--` must be an lvalue",
            ));
        }
        if !types::is_arithmetic(&self.tu.types, e.ty) {
            return Err(self.type_error(id, "operand of `++`/`--` must be arithmetic"));
        }
        Ok(())
    }

    // === Binary operators ===

    fn binop_from_text(text: &str) -> Option<BinOp> {
        Some(match text {
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Mod,
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "<<" => BinOp::Shl,
            ">>" => BinOp::Shr,
            "<" => BinOp::Lt,
            ">" => BinOp::Gt,
            "<=" => BinOp::Le,
            ">=" => BinOp::Ge,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "&" => BinOp::BitAnd,
            "^" => BinOp::BitXor,
            "|" => BinOp::BitOr,
            _ => return None,
        })
    }

    fn lower_binary(&mut self, id: PNodeId, span: Span) -> Result<ExprId> {
        let kids = self.child_nodes(id);
        let op_text = self.child_tokens(id)[0].to_string();
        let op = Self::binop_from_text(&op_text)
            .ok_or_else(|| self.unsupported(id, &format!("unsupported operator `{}`", op_text)))?;

        let lhs = self.lower_expr(kids[0])?;
        let rhs = self.lower_expr(kids[1])?;
        let ty = self.binary_result_type(id, op, lhs, rhs)?;
        Ok(self.add_expr(
            ExprKind::Binary { op, lhs, rhs },
            span,
            ty,
            ValueCategory::RValue,
        ))
    }

    /// Result type of a binary operator per C99: usual arithmetic
    /// conversions, except shifts (promoted left operand) and
    /// relational/equality operators (`int`).
    pub(crate) fn binary_result_type(
        &self,
        id: PNodeId,
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    ) -> Result<TypeId> {
        let tl = self.tu.expr(lhs).ty;
        let tr = self.tu.expr(rhs).ty;
        let table = &self.tu.types;

        if !types::is_arithmetic(table, tl) || !types::is_arithmetic(table, tr) {
            if matches!(table.get(tl), CType::Pointer(_) | CType::Array { .. })
                || matches!(table.get(tr), CType::Pointer(_) | CType::Array { .. })
            {
                return Err(self.unsupported(id, "pointer arithmetic is not supported"));
            }
            return Err(self.type_error(id, "operands must have arithmetic type"));
        }
        if op.integer_only()
            && (!types::is_integer(table, tl) || !types::is_integer(table, tr))
        {
            return Err(self.type_error(
                id,
                format!("operands of `{}` must be integers", op.snippet_name()),
            ));
        }

        Ok(if op.is_relational() {
            table.int_()
        } else if matches!(op, BinOp::Shl | BinOp::Shr) {
            types::promote_integer(table, tl)
        } else {
            types::usual_arithmetic(table, tl, tr)
        })
    }

    fn lower_logical(&mut self, id: PNodeId, span: Span) -> Result<ExprId> {
        let kids = self.child_nodes(id);
        let op = if self.rule(id) == "logical-AND-expression" {
            LogicalOp::And
        } else {
            LogicalOp::Or
        };
        let lhs = self.lower_expr(kids[0])?;
        let rhs = self.lower_expr(kids[1])?;
        for (&e, &node) in [lhs, rhs].iter().zip(&[kids[0], kids[1]]) {
            let ty = self.tu.expr(e).ty;
            if !types::is_arithmetic(&self.tu.types, ty) {
                return Err(self.type_error(node, "operands of `&&`/`||` must be scalar"));
            }
        }
        let int = self.tu.types.int_();
        Ok(self.add_expr(
            ExprKind::Logical { op, lhs, rhs },
            span,
            int,
            ValueCategory::RValue,
        ))
    }

    fn lower_conditional(&mut self, id: PNodeId, span: Span) -> Result<ExprId> {
        let kids = self.child_nodes(id);
        let cond = self.lower_condition(kids[0])?;
        let then_expr = self.lower_expr(kids[1])?;
        let else_expr = self.lower_expr(kids[2])?;

        let tt = self.tu.expr(then_expr).ty;
        let te = self.tu.expr(else_expr).ty;
        let table = &self.tu.types;
        let ty = if types::is_arithmetic(table, tt) && types::is_arithmetic(table, te) {
            types::usual_arithmetic(table, tt, te)
        } else if tt == te && (tt == table.void() || matches!(table.get(tt), CType::Struct(_))) {
            tt
        } else {
            return Err(self.type_error(id, "incompatible conditional branches"));
        };
        Ok(self.add_expr(
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            },
            span,
            ty,
            ValueCategory::RValue,
        ))
    }

    // === Assignment, comma ===

    fn lower_assignment(&mut self, id: PNodeId, span: Span) -> Result<ExprId> {
        let kids = self.child_nodes(id);
        let op_text = self.child_tokens(kids[1])[0].to_string();
        let op = match op_text.as_str() {
            "=" => None,
            compound => Some(
                Self::binop_from_text(&compound[..compound.len() - 1]).ok_or_else(|| {
                    self.unsupported(id, &format!("unsupported operator `{}`", compound))
                })?,
            ),
        };

        let lhs = self.lower_expr(kids[0])?;
        let rhs = self.lower_expr(kids[2])?;

        let lhs_expr = self.tu.expr(lhs);
        if lhs_expr.category != ValueCategory::LValue {
            return Err(SemaError::new(
                SemaErrorKind::NotAnLvalue,
                self.span(kids[0]),
                "assignment target is not an lvalue",
            ));
        }
        let lhs_ty = lhs_expr.ty;
        let rhs_ty = self.tu.expr(rhs).ty;
        let table = &self.tu.types;
        match table.get(lhs_ty) {
            CType::Array { .. } => {
                return Err(self.type_error(id, "cannot assign to an array"));
            }
            CType::Struct(_) => {
                return Err(self.unsupported(id, "struct assignment is not supported"));
            }
            CType::Pointer(_) => {
                return Err(self.unsupported(id, "pointer assignment is not supported"));
            }
            _ => {}
        }
        if !types::is_arithmetic(table, lhs_ty) || !types::is_arithmetic(table, rhs_ty) {
            return Err(self.type_error(id, "incompatible assignment"));
        }
        if let Some(binop) = op {
            // `x OP= e` has the constraints of `x OP e`.
            self.binary_result_type(id, binop, lhs, rhs)?;
        }

        Ok(self.add_expr(
            ExprKind::Assign { op, lhs, rhs },
            span,
            lhs_ty,
            ValueCategory::RValue,
        ))
    }

    fn lower_comma(&mut self, id: PNodeId, span: Span) -> Result<ExprId> {
        let kids = self.child_nodes(id);
        let lhs = self.lower_expr(kids[0])?;
        let rhs = self.lower_expr(kids[1])?;
        let ty = self.tu.expr(rhs).ty;
        Ok(self.add_expr(
            ExprKind::Comma { lhs, rhs },
            span,
            ty,
            ValueCategory::RValue,
        ))
    }
}
