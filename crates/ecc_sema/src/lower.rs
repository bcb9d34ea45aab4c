//! The semantic walker: declarations, declarators, and statements.
//!
//! Expression typing lives in `expr.rs`; this file owns the pass driver,
//! parse-tree navigation helpers, specifier and declarator processing, and
//! statement lowering.

use std::collections::HashMap;

use ecc_ast::{
    ArrayExtent, CType, Function, FuncId, Local, LocalId, Span, Stmt, StmtId, StmtKind,
    TranslationUnit, TypeId,
};
use ecc_ast::stmt::ForInit;
use ecc_lexer::TokenKind;
use ecc_parser::{PChild, PNodeId, Parse};
use ecc_types as types;

use crate::constants;
use crate::scope::{Binding, Scopes};
use crate::{SemaError, SemaErrorKind};

type Result<T> = std::result::Result<T, SemaError>;

/// A lowered declarator: the declared name (absent for abstract and
/// unnamed-parameter declarators), the derived type, and — when the
/// outermost derivation is a function — its parameter declarations.
pub(crate) struct DeclInfo {
    pub name: Option<String>,
    pub ty: TypeId,
    pub params: Option<Vec<ParamDecl>>,
    pub variadic: bool,
    pub span: Span,
}

pub(crate) struct ParamDecl {
    pub name: Option<String>,
    pub ty: TypeId,
    pub span: Span,
}

pub(crate) struct Sema<'a> {
    pub parse: &'a Parse,
    pub tu: TranslationUnit,
    pub scopes: Scopes,
    pub errors: Vec<SemaError>,
    /// Function name → id, for signature compatibility checks.
    func_ids: HashMap<String, FuncId>,
    /// Return type of the function currently being lowered.
    pub cur_ret: TypeId,
    /// Locals of the function currently being lowered, parameters first.
    pub cur_locals: Vec<Local>,
    pub loop_depth: u32,
}

impl<'a> Sema<'a> {
    pub fn new(parse: &'a Parse) -> Self {
        let tu = TranslationUnit::new();
        let void = tu.types.void();
        Self {
            parse,
            tu,
            scopes: Scopes::new(),
            errors: Vec::new(),
            func_ids: HashMap::new(),
            cur_ret: void,
            cur_locals: Vec::new(),
            loop_depth: 0,
        }
    }

    pub fn run(mut self) -> std::result::Result<TranslationUnit, Vec<SemaError>> {
        let root = self.parse.tree.root;
        for ext in self.list(root, "translation-unit") {
            let ext = self.shrink(ext);
            let result = match self.rule(ext) {
                "function-definition" => self.lower_function_definition(ext),
                "declaration" => self.lower_file_scope_declaration(ext),
                other => Err(self.unsupported(ext, &format!("unsupported construct `{}`", other))),
            };
            if let Err(e) = result {
                self.errors.push(e);
            }
        }

        if self.errors.is_empty() {
            Ok(self.tu)
        } else {
            Err(self.errors)
        }
    }

    // === Parse-tree navigation ===

    pub fn rule(&self, id: PNodeId) -> &str {
        &self.parse.tree.node(id).rule
    }

    pub fn children(&self, id: PNodeId) -> &[PChild] {
        &self.parse.tree.node(id).children
    }

    /// Descend through single-node chains (`expression` →
    /// `assignment-expression` → ... ) to the first interesting node.
    pub fn shrink(&self, mut id: PNodeId) -> PNodeId {
        loop {
            let children = self.children(id);
            if children.len() == 1 {
                if let PChild::Node(c) = children[0] {
                    id = c;
                    continue;
                }
            }
            return id;
        }
    }

    pub fn span(&self, id: PNodeId) -> Span {
        let s = self.parse.tree.node(id).span;
        Span::new(s.start, s.end)
    }

    pub fn token_text(&self, index: u32) -> &str {
        &self.parse.tokens[index as usize].text
    }

    pub fn token_kind(&self, index: u32) -> TokenKind {
        self.parse.tokens[index as usize].kind
    }

    /// Direct child nodes, in order.
    pub fn child_nodes(&self, id: PNodeId) -> Vec<PNodeId> {
        self.children(id)
            .iter()
            .filter_map(|c| match c {
                PChild::Node(n) => Some(*n),
                PChild::Token(_) => None,
            })
            .collect()
    }

    /// Direct child token texts, in order.
    pub fn child_tokens(&self, id: PNodeId) -> Vec<&str> {
        self.children(id)
            .iter()
            .filter_map(|c| match c {
                PChild::Token(t) => Some(self.token_text(*t)),
                PChild::Node(_) => None,
            })
            .collect()
    }

    pub fn has_child_token(&self, id: PNodeId, text: &str) -> bool {
        self.child_tokens(id).contains(&text)
    }

    /// Flatten a left-recursive list rule into its element nodes.
    pub fn list(&self, id: PNodeId, rule: &str) -> Vec<PNodeId> {
        let mut out = Vec::new();
        self.list_rec(id, rule, &mut out);
        out
    }

    fn list_rec(&self, id: PNodeId, rule: &str, out: &mut Vec<PNodeId>) {
        if self.rule(id) == rule {
            for child in self.child_nodes(id) {
                if self.rule(child) == rule {
                    self.list_rec(child, rule, out);
                } else {
                    out.push(child);
                }
            }
        } else {
            out.push(id);
        }
    }

    pub fn unsupported(&self, id: PNodeId, message: &str) -> SemaError {
        SemaError::new(SemaErrorKind::UnsupportedConstruct, self.span(id), message)
    }

    pub fn type_error(&self, id: PNodeId, message: impl Into<String>) -> SemaError {
        SemaError::new(SemaErrorKind::TypeMismatch, self.span(id), message)
    }

    // === Declaration specifiers ===

    /// Collect the specifier nodes of a `declaration-specifiers` or
    /// `specifier-qualifier-list` into one flat list.
    fn collect_specifiers(&self, id: PNodeId, out: &mut Vec<PNodeId>) {
        for child in self.child_nodes(id) {
            match self.rule(child) {
                "declaration-specifiers" | "specifier-qualifier-list" => {
                    self.collect_specifiers(child, out)
                }
                _ => out.push(child),
            }
        }
    }

    /// Resolve declaration specifiers to a base type. Storage-class
    /// specifiers are rejected; qualifiers and `inline` are accepted and
    /// ignored.
    pub(crate) fn lower_specifiers(&mut self, id: PNodeId) -> Result<TypeId> {
        let mut specs = Vec::new();
        self.collect_specifiers(id, &mut specs);

        let mut words: Vec<String> = Vec::new();
        let mut composite: Option<PNodeId> = None;
        for spec in specs {
            match self.rule(spec) {
                "storage-class-specifier" => {
                    let word = self.child_tokens(spec).first().copied().unwrap_or("");
                    return Err(self.unsupported(
                        spec,
                        &format!("storage-class specifier `{}` is not supported", word),
                    ));
                }
                "type-qualifier" | "function-specifier" => {}
                "type-specifier" => {
                    let inner = self.child_nodes(spec);
                    if let Some(&node) = inner.first() {
                        if composite.replace(node).is_some() {
                            return Err(self.type_error(spec, "multiple struct/enum specifiers"));
                        }
                    } else {
                        words.push(self.child_tokens(spec)[0].to_string());
                    }
                }
                other => {
                    return Err(self.unsupported(spec, &format!("unexpected specifier `{}`", other)))
                }
            }
        }

        if let Some(node) = composite {
            if !words.is_empty() {
                return Err(self.type_error(
                    id,
                    "struct specifier combined with other type specifiers",
                ));
            }
            return match self.rule(node) {
                "struct-or-union-specifier" => self.lower_struct_specifier(node),
                "enum-specifier" => Err(self.unsupported(node, "enums are not supported")),
                other => Err(self.unsupported(node, &format!("unsupported specifier `{}`", other))),
            };
        }

        self.resolve_basic_type(id, &words)
    }

    fn resolve_basic_type(&mut self, id: PNodeId, words: &[String]) -> Result<TypeId> {
        let count = |w: &str| words.iter().filter(|x| x.as_str() == w).count();
        let signed = count("signed");
        let unsigned = count("unsigned");
        let longs = count("long");
        let (void, bool_, char_, short, int, float, double) = (
            count("void"),
            count("_Bool"),
            count("char"),
            count("short"),
            count("int"),
            count("float"),
            count("double"),
        );

        if count("_Complex") > 0 || count("_Imaginary") > 0 {
            return Err(self.unsupported(id, "complex types are not supported"));
        }
        if signed + unsigned > 1 {
            return Err(self.type_error(id, "both signed and unsigned in type specifiers"));
        }
        let has_sign = signed + unsigned > 0;
        let t = &self.tu.types;

        let ty = match (void, bool_, char_, short, longs, int, float, double) {
            (1, 0, 0, 0, 0, 0, 0, 0) if !has_sign => t.void(),
            (0, 1, 0, 0, 0, 0, 0, 0) if !has_sign => t.bool_(),
            (0, 0, 1, 0, 0, 0, 0, 0) if signed == 1 => t.schar(),
            (0, 0, 1, 0, 0, 0, 0, 0) if unsigned == 1 => t.uchar(),
            (0, 0, 1, 0, 0, 0, 0, 0) => t.char_(),
            (0, 0, 0, 1, 0, 0..=1, 0, 0) if unsigned == 1 => t.ushort(),
            (0, 0, 0, 1, 0, 0..=1, 0, 0) => t.short(),
            (0, 0, 0, 0, 0, 1, 0, 0) | (0, 0, 0, 0, 0, 0, 0, 0) if unsigned == 1 => t.uint(),
            (0, 0, 0, 0, 0, 1, 0, 0) => t.int_(),
            (0, 0, 0, 0, 0, 0, 0, 0) if signed == 1 => t.int_(),
            (0, 0, 0, 0, 1, 0..=1, 0, 0) if unsigned == 1 => t.ulong(),
            (0, 0, 0, 0, 1, 0..=1, 0, 0) => t.long_(),
            (0, 0, 0, 0, 2, 0..=1, 0, 0) if unsigned == 1 => t.ulonglong(),
            (0, 0, 0, 0, 2, 0..=1, 0, 0) => t.longlong(),
            (0, 0, 0, 0, 0, 0, 1, 0) if !has_sign => t.float(),
            (0, 0, 0, 0, 0, 0, 0, 1) if !has_sign => t.double(),
            (0, 0, 0, 0, 1, 0, 0, 1) if !has_sign => t.longdouble(),
            _ => {
                if words.is_empty() {
                    return Err(self.type_error(id, "declaration has no type specifier"));
                }
                return Err(self.type_error(
                    id,
                    format!("invalid type specifier combination `{}`", words.join(" ")),
                ));
            }
        };
        Ok(ty)
    }

    fn lower_struct_specifier(&mut self, id: PNodeId) -> Result<TypeId> {
        let keyword_node = self.child_nodes(id)[0];
        if self.child_tokens(keyword_node)[0] == "union" {
            return Err(self.unsupported(id, "unions are not supported"));
        }

        let tag = self
            .children(id)
            .iter()
            .find_map(|c| match c {
                PChild::Token(t) if self.token_kind(*t) == TokenKind::Identifier => {
                    Some(self.token_text(*t).to_string())
                }
                _ => None,
            })
            .unwrap_or_default();

        if !self.has_child_token(id, "{") {
            // Tag reference: `struct X`.
            return self.scopes.resolve_tag(&tag).ok_or_else(|| {
                SemaError::new(
                    SemaErrorKind::UndeclaredIdentifier,
                    self.span(id),
                    format!("undeclared struct tag `{}`", tag),
                )
            });
        }

        let body = self
            .child_nodes(id)
            .into_iter()
            .find(|n| self.rule(*n) == "struct-declaration-list")
            .ok_or_else(|| self.type_error(id, "struct has no members"))?;

        let mut fields: Vec<(String, TypeId)> = Vec::new();
        for decl in self.list(body, "struct-declaration-list") {
            let kids = self.child_nodes(decl);
            let base = self.lower_specifiers(kids[0])?;
            let declarators = self.list(kids[1], "struct-declarator-list");
            for sd in declarators {
                if self.has_child_token(sd, ":") {
                    return Err(self.unsupported(sd, "bitfields are not supported"));
                }
                let declarator = self.child_nodes(sd)[0];
                let info = self.lower_declarator(declarator, base, false)?;
                let name = info
                    .name
                    .ok_or_else(|| self.type_error(sd, "struct member has no name"))?;
                if types::size_of(&self.tu.types, info.ty).is_none() {
                    return Err(
                        self.type_error(sd, format!("member `{}` has no constant size", name))
                    );
                }
                if fields.iter().any(|(n, _)| *n == name) {
                    return Err(SemaError::new(
                        SemaErrorKind::Redeclaration,
                        info.span,
                        format!("duplicate member `{}`", name),
                    ));
                }
                fields.push((name, info.ty));
            }
        }
        if fields.is_empty() {
            return Err(self.type_error(id, "struct has no members"));
        }

        let def = types::compute_struct_layout(&self.tu.types, &tag, fields);
        let ty = self.tu.types.add_struct(def);
        if !tag.is_empty() {
            if self.scopes.declare_tag(&tag, ty).is_err() {
                return Err(SemaError::new(
                    SemaErrorKind::Redeclaration,
                    self.span(id),
                    format!("redeclaration of struct `{}`", tag),
                ));
            }
        }
        Ok(ty)
    }

    // === Declarators ===

    pub(crate) fn lower_declarator(
        &mut self,
        id: PNodeId,
        base: TypeId,
        in_params: bool,
    ) -> Result<DeclInfo> {
        debug_assert_eq!(self.rule(id), "declarator");
        let kids = self.child_nodes(id);
        let (pointer, direct) = if kids.len() == 2 {
            (Some(kids[0]), kids[1])
        } else {
            (None, kids[0])
        };

        let mut base = base;
        if let Some(ptr) = pointer {
            for _ in 0..self.count_stars(ptr) {
                base = self.tu.types.pointer_to(base);
            }
        }
        self.lower_direct_declarator(direct, base, in_params)
    }

    fn count_stars(&self, pointer: PNodeId) -> usize {
        let mut count = self
            .child_tokens(pointer)
            .iter()
            .filter(|t| **t == "*")
            .count();
        for child in self.child_nodes(pointer) {
            if self.rule(child) == "pointer" {
                count += self.count_stars(child);
            }
        }
        count
    }

    fn lower_direct_declarator(
        &mut self,
        id: PNodeId,
        base: TypeId,
        in_params: bool,
    ) -> Result<DeclInfo> {
        let children = self.children(id).to_vec();

        // Plain identifier.
        if children.len() == 1 {
            if let PChild::Token(t) = children[0] {
                return Ok(DeclInfo {
                    name: Some(self.token_text(t).to_string()),
                    ty: base,
                    params: None,
                    variadic: false,
                    span: self.span(id),
                });
            }
        }

        // `( declarator )`.
        if let PChild::Token(t) = children[0] {
            if self.token_text(t) == "(" {
                if let PChild::Node(inner) = children[1] {
                    return self.lower_declarator(inner, base, in_params);
                }
            }
        }

        // Suffix forms: `direct-declarator [ ... ]` and
        // `direct-declarator ( ... )`.
        let head = match children[0] {
            PChild::Node(n) => n,
            PChild::Token(_) => return Err(self.unsupported(id, "unsupported declarator form")),
        };
        let suffix_open = match children[1] {
            PChild::Token(t) => self.token_text(t),
            PChild::Node(_) => return Err(self.unsupported(id, "unsupported declarator form")),
        };

        match suffix_open {
            "[" => {
                let extent = self.lower_array_suffix(id, &children, in_params)?;
                let inner = self.tu.types.array_of(base, extent);
                self.lower_direct_declarator(head, inner, in_params)
            }
            "(" => {
                let (params, variadic) = self.lower_function_suffix(id, &children)?;
                let param_types: Vec<TypeId> = params.iter().map(|p| p.ty).collect();
                let ftype = self.tu.types.intern(CType::Function {
                    ret: base,
                    params: param_types,
                    variadic,
                });
                let mut info = self.lower_direct_declarator(head, ftype, in_params)?;
                if info.params.is_none() && info.ty == ftype {
                    info.params = Some(params);
                    info.variadic = variadic;
                }
                Ok(info)
            }
            other => Err(self.unsupported(id, &format!("unsupported declarator `{}`", other))),
        }
    }

    fn lower_array_suffix(
        &mut self,
        id: PNodeId,
        children: &[PChild],
        in_params: bool,
    ) -> Result<ArrayExtent> {
        // `static` and `[*]` forms, and qualified array declarators, are
        // out of scope.
        for child in &children[1..] {
            match child {
                PChild::Token(t) => {
                    let text = self.token_text(*t);
                    if text == "static" || text == "*" {
                        return Err(self.unsupported(id, "qualified array declarators are not supported"));
                    }
                }
                PChild::Node(n) => {
                    if self.rule(*n) == "type-qualifier-list" {
                        return Err(self.unsupported(id, "qualified array declarators are not supported"));
                    }
                }
            }
        }

        let extent_node = children[1..].iter().find_map(|c| match c {
            PChild::Node(n) => Some(*n),
            PChild::Token(_) => None,
        });
        let extent_node = match extent_node {
            None => return Ok(ArrayExtent::Incomplete),
            Some(n) => n,
        };

        // A literal extent is a fixed-size array; anything else is a VLA
        // whose extent is evaluated at the point of declaration.
        let shrunk = self.shrink(extent_node);
        if self.rule(shrunk) == "primary-expression" {
            if let [PChild::Token(t)] = self.children(shrunk) {
                if self.token_kind(*t) == TokenKind::IntConstant {
                    let (value, _) =
                        constants::type_integer_constant(&self.tu.types, self.token_text(*t))
                            .map_err(|m| self.type_error(shrunk, m))?;
                    return Ok(ArrayExtent::Fixed(value));
                }
            }
        }
        if in_params {
            // Array parameters decay to pointers; the extent is not part
            // of the parameter's type.
            return Ok(ArrayExtent::Incomplete);
        }
        let expr = self.lower_expr(extent_node)?;
        let ty = self.tu.expr(expr).ty;
        if !types::is_integer(&self.tu.types, ty) {
            return Err(self.type_error(extent_node, "array extent must be an integer"));
        }
        Ok(ArrayExtent::Variable(expr))
    }

    fn lower_function_suffix(
        &mut self,
        id: PNodeId,
        children: &[PChild],
    ) -> Result<(Vec<ParamDecl>, bool)> {
        let inner = children[1..].iter().find_map(|c| match c {
            PChild::Node(n) => Some(*n),
            PChild::Token(_) => None,
        });
        let inner = match inner {
            None => return Ok((Vec::new(), false)), // `()`
            Some(n) => n,
        };

        match self.rule(inner) {
            "identifier-list" => {
                Err(self.unsupported(id, "old-style parameter lists are not supported"))
            }
            "parameter-type-list" => {
                let variadic = self.has_child_token(inner, "...");
                let list_node = self.child_nodes(inner)[0];
                let mut params = Vec::new();
                for p in self.list(list_node, "parameter-list") {
                    params.push(self.lower_parameter_decl(p)?);
                }
                // `(void)` declares zero parameters.
                if params.len() == 1
                    && params[0].name.is_none()
                    && params[0].ty == self.tu.types.void()
                {
                    params.clear();
                }
                if params.iter().any(|p| p.ty == self.tu.types.void()) {
                    return Err(self.type_error(id, "parameter has void type"));
                }
                Ok((params, variadic))
            }
            other => Err(self.unsupported(id, &format!("unsupported parameter form `{}`", other))),
        }
    }

    fn lower_parameter_decl(&mut self, id: PNodeId) -> Result<ParamDecl> {
        let kids = self.child_nodes(id);
        let base = self.lower_specifiers(kids[0])?;

        let (name, ty) = match kids.get(1) {
            None => (None, base),
            Some(&second) => match self.rule(second) {
                "declarator" => {
                    let info = self.lower_declarator(second, base, true)?;
                    (info.name, info.ty)
                }
                "abstract-declarator" => (None, self.lower_abstract_declarator(second, base)?),
                other => {
                    return Err(
                        self.unsupported(second, &format!("unsupported parameter `{}`", other))
                    )
                }
            },
        };

        // Array-of-T parameters decay to pointer-to-T (6.7.5.3p7).
        let ty = types::decay(&mut self.tu.types, ty);
        if matches!(self.tu.types.get(ty), CType::Function { .. }) {
            return Err(self.unsupported(id, "function parameters are not supported"));
        }
        Ok(ParamDecl {
            name,
            ty,
            span: self.span(id),
        })
    }

    pub(crate) fn lower_abstract_declarator(
        &mut self,
        id: PNodeId,
        base: TypeId,
    ) -> Result<TypeId> {
        let kids = self.child_nodes(id);
        let mut base = base;
        let mut direct = None;
        for kid in kids {
            match self.rule(kid) {
                "pointer" => {
                    for _ in 0..self.count_stars(kid) {
                        base = self.tu.types.pointer_to(base);
                    }
                }
                "direct-abstract-declarator" => direct = Some(kid),
                _ => {}
            }
        }
        match direct {
            None => Ok(base),
            Some(d) => self.lower_direct_abstract(d, base),
        }
    }

    fn lower_direct_abstract(&mut self, id: PNodeId, base: TypeId) -> Result<TypeId> {
        let children = self.children(id).to_vec();

        // `( abstract-declarator )`.
        if let (PChild::Token(t), Some(PChild::Node(inner))) = (children[0], children.get(1).copied())
        {
            if self.token_text(t) == "(" && self.rule(inner) == "abstract-declarator" {
                return self.lower_abstract_declarator(inner, base);
            }
        }

        let (head, suffix) = match children[0] {
            PChild::Node(n) if self.rule(n) == "direct-abstract-declarator" => {
                (Some(n), &children[1..])
            }
            _ => (None, &children[..]),
        };

        let open = suffix.iter().find_map(|c| match c {
            PChild::Token(t) => Some(self.token_text(*t)),
            PChild::Node(_) => None,
        });
        let inner = match open {
            Some("[") => {
                let extent_node = suffix.iter().find_map(|c| match c {
                    PChild::Node(n) => Some(*n),
                    PChild::Token(_) => None,
                });
                let extent = match extent_node {
                    None => ArrayExtent::Incomplete,
                    Some(n) => {
                        let shrunk = self.shrink(n);
                        match self.children(shrunk) {
                            [PChild::Token(t)]
                                if self.token_kind(*t) == TokenKind::IntConstant =>
                            {
                                let (value, _) = constants::type_integer_constant(
                                    &self.tu.types,
                                    self.token_text(*t),
                                )
                                .map_err(|m| self.type_error(shrunk, m))?;
                                ArrayExtent::Fixed(value)
                            }
                            _ => {
                                return Err(self.unsupported(
                                    id,
                                    "non-constant extent in abstract declarator",
                                ))
                            }
                        }
                    }
                };
                self.tu.types.array_of(base, extent)
            }
            Some("(") => {
                return Err(self.unsupported(id, "function abstract declarators are not supported"))
            }
            _ => return Err(self.unsupported(id, "unsupported abstract declarator")),
        };

        match head {
            None => Ok(inner),
            Some(h) => self.lower_direct_abstract(h, inner),
        }
    }

    /// `type-name` in casts and compound literals.
    pub(crate) fn lower_type_name(&mut self, id: PNodeId) -> Result<TypeId> {
        let kids = self.child_nodes(id);
        let base = self.lower_specifiers(kids[0])?;
        match kids.get(1) {
            None => Ok(base),
            Some(&abs) => self.lower_abstract_declarator(abs, base),
        }
    }

    // === Functions ===

    fn lower_function_definition(&mut self, id: PNodeId) -> Result<()> {
        let kids = self.child_nodes(id);
        if kids.iter().any(|k| self.rule(*k) == "declaration-list") {
            return Err(self.unsupported(id, "old-style function definitions are not supported"));
        }
        let ret = self.lower_specifiers(kids[0])?;
        let info = self.lower_declarator(kids[1], ret, false)?;
        let body_node = *kids.last().unwrap();

        let name = info
            .name
            .clone()
            .ok_or_else(|| self.type_error(id, "function has no name"))?;
        let params = match info.params {
            Some(p) => p,
            None => return Err(self.type_error(id, "expected a function declarator")),
        };
        if info.variadic {
            return Err(self.unsupported(id, "variadic functions are not supported"));
        }

        let (ret, param_types) = match self.tu.types.get(info.ty) {
            CType::Function { ret, params, .. } => (*ret, params.clone()),
            _ => return Err(self.type_error(id, "expected a function declarator")),
        };
        self.check_signature_types(id, ret, &param_types)?;

        let func = self.declare_function(&name, ret, &param_types, info.span)?;
        if self.tu.functions[func.0 as usize].is_defined() {
            return Err(SemaError::new(
                SemaErrorKind::Redeclaration,
                info.span,
                format!("redefinition of `{}`", name),
            ));
        }

        // Parameters live in the same scope as the function's outermost
        // locals; the body compound statement must not open another one.
        self.cur_ret = ret;
        self.cur_locals = Vec::new();
        self.loop_depth = 0;
        self.scopes.push();

        let mut result = Ok(());
        for param in &params {
            let pname = match &param.name {
                Some(n) => n.clone(),
                None => {
                    result = Err(self.type_error(id, "parameter name omitted in definition"));
                    break;
                }
            };
            let local = LocalId(self.cur_locals.len() as u32);
            self.cur_locals.push(Local {
                name: pname.clone(),
                ty: param.ty,
                span: param.span,
                is_param: true,
            });
            if self.scopes.declare(&pname, Binding::Local(local)).is_err() {
                result = Err(SemaError::new(
                    SemaErrorKind::Redeclaration,
                    param.span,
                    format!("duplicate parameter `{}`", pname),
                ));
                break;
            }
        }

        let body = match result {
            Ok(()) => self.lower_compound(body_node, false),
            Err(e) => Err(e),
        };
        self.scopes.pop();

        let body = body?;
        let f = &mut self.tu.functions[func.0 as usize];
        f.params = (0..params.len() as u32).map(LocalId).collect();
        f.locals = std::mem::take(&mut self.cur_locals);
        f.body = Some(body);
        Ok(())
    }

    fn check_signature_types(&self, id: PNodeId, ret: TypeId, params: &[TypeId]) -> Result<()> {
        let table = &self.tu.types;
        if ret != table.void() && !types::is_arithmetic(table, ret) {
            return Err(self.unsupported(id, "unsupported return type"));
        }
        for &p in params {
            let ok = types::is_arithmetic(table, p) || matches!(table.get(p), CType::Pointer(_));
            if !ok {
                return Err(self.unsupported(id, "unsupported parameter type"));
            }
        }
        Ok(())
    }

    /// Declare or re-declare a function. Forward declarations with a
    /// compatible signature merge into one id.
    fn declare_function(
        &mut self,
        name: &str,
        ret: TypeId,
        params: &[TypeId],
        span: Span,
    ) -> Result<FuncId> {
        if let Some(&existing) = self.func_ids.get(name) {
            let f = &self.tu.functions[existing.0 as usize];
            let compatible = f.ret == ret && f.param_types == params;
            if !compatible {
                return Err(SemaError::new(
                    SemaErrorKind::Redeclaration,
                    span,
                    format!("conflicting declaration of `{}`", name),
                ));
            }
            return Ok(existing);
        }

        let id = FuncId(self.tu.functions.len() as u32);
        self.tu.functions.push(Function {
            name: name.to_string(),
            ret,
            param_types: params.to_vec(),
            params: Vec::new(),
            locals: Vec::new(),
            body: None,
            span,
        });
        self.func_ids.insert(name.to_string(), id);
        if self.scopes.declare(name, Binding::Func(id)).is_err() {
            return Err(SemaError::new(
                SemaErrorKind::Redeclaration,
                span,
                format!("redeclaration of `{}`", name),
            ));
        }
        Ok(id)
    }

    fn lower_file_scope_declaration(&mut self, id: PNodeId) -> Result<()> {
        let kids = self.child_nodes(id);
        let base = self.lower_specifiers(kids[0])?;
        let Some(&list_node) = kids.get(1) else {
            // Bare `struct S { ... };` — declares the tag only.
            return Ok(());
        };

        for init_decl in self.list(list_node, "init-declarator-list") {
            let decl_kids = self.child_nodes(init_decl);
            let info = self.lower_declarator(decl_kids[0], base, false)?;
            match self.tu.types.get(info.ty) {
                CType::Function { ret, params, .. } => {
                    let (ret, params) = (*ret, params.clone());
                    if info.variadic {
                        return Err(self.unsupported(init_decl, "variadic functions are not supported"));
                    }
                    if decl_kids.len() > 1 {
                        return Err(self.type_error(init_decl, "function declared with initializer"));
                    }
                    self.check_signature_types(init_decl, ret, &params)?;
                    let name = info
                        .name
                        .ok_or_else(|| self.type_error(init_decl, "function has no name"))?;
                    self.declare_function(&name, ret, &params, info.span)?;
                }
                _ => {
                    return Err(self.unsupported(
                        init_decl,
                        "global variables are not supported",
                    ));
                }
            }
        }
        Ok(())
    }

    // === Statements ===

    pub(crate) fn lower_compound(&mut self, id: PNodeId, push_scope: bool) -> Result<StmtId> {
        debug_assert_eq!(self.rule(id), "compound-statement");
        if push_scope {
            self.scopes.push();
        }
        let result = self.lower_block_items(id);
        if push_scope {
            self.scopes.pop();
        }
        let items = result?;
        Ok(self.add_stmt(StmtKind::Compound(items), self.span(id)))
    }

    fn lower_block_items(&mut self, id: PNodeId) -> Result<Vec<StmtId>> {
        let mut items = Vec::new();
        let Some(list_node) = self.child_nodes(id).first().copied() else {
            return Ok(items); // `{ }`
        };
        for item in self.list(list_node, "block-item-list") {
            let item = self.shrink(item);
            if self.rule(item) == "declaration" {
                self.lower_local_declaration(item, &mut items)?;
            } else {
                items.push(self.lower_statement(item)?);
            }
        }
        Ok(items)
    }

    fn lower_local_declaration(&mut self, id: PNodeId, out: &mut Vec<StmtId>) -> Result<()> {
        let kids = self.child_nodes(id);
        let base = self.lower_specifiers(kids[0])?;
        let Some(&list_node) = kids.get(1) else {
            return Ok(()); // struct tag declaration
        };

        for init_decl in self.list(list_node, "init-declarator-list") {
            let decl_kids = self.child_nodes(init_decl);
            let info = self.lower_declarator(decl_kids[0], base, false)?;
            let name = info
                .name
                .clone()
                .ok_or_else(|| self.type_error(init_decl, "declaration has no name"))?;

            if let CType::Function { ret, params, .. } = self.tu.types.get(info.ty) {
                // Block-scope prototype.
                let (ret, params) = (*ret, params.clone());
                self.check_signature_types(init_decl, ret, &params)?;
                self.declare_function(&name, ret, &params, info.span)?;
                continue;
            }

            if info.ty == self.tu.types.void() {
                return Err(self.type_error(init_decl, format!("`{}` declared void", name)));
            }

            let is_vla = self.type_has_variable_extent(info.ty);
            let local = LocalId(self.cur_locals.len() as u32);
            self.cur_locals.push(Local {
                name: name.clone(),
                ty: info.ty,
                span: info.span,
                is_param: false,
            });
            if self.scopes.declare(&name, Binding::Local(local)).is_err() {
                return Err(SemaError::new(
                    SemaErrorKind::Redeclaration,
                    info.span,
                    format!("redeclaration of `{}`", name),
                ));
            }

            let init = match decl_kids.get(1) {
                None => None,
                Some(&init_node) => {
                    let init_inner = self.shrink(init_node);
                    if self.rule(init_inner) == "initializer"
                        || self.has_child_token(init_inner, "{")
                    {
                        return Err(
                            self.unsupported(init_node, "braced initializers are not supported")
                        );
                    }
                    if is_vla {
                        return Err(self.type_error(init_node, "VLA may not be initialized"));
                    }
                    let expr = self.lower_expr(init_inner)?;
                    let ety = self.tu.expr(expr).ty;
                    if !types::is_assign_compatible(&self.tu.types, info.ty, ety)
                        || !types::is_arithmetic(&self.tu.types, info.ty)
                    {
                        return Err(self.type_error(init_node, "incompatible initializer"));
                    }
                    Some(expr)
                }
            };
            out.push(self.add_stmt(StmtKind::Decl { local, init }, info.span));
        }
        Ok(())
    }

    pub(crate) fn type_has_variable_extent(&self, ty: TypeId) -> bool {
        match self.tu.types.get(ty) {
            CType::Array { element, extent } => {
                matches!(extent, ArrayExtent::Variable(_))
                    || self.type_has_variable_extent(*element)
            }
            _ => false,
        }
    }

    fn lower_statement(&mut self, id: PNodeId) -> Result<StmtId> {
        let id = self.shrink(id);
        match self.rule(id) {
            "compound-statement" => self.lower_compound(id, true),
            "expression-statement" => {
                let span = self.span(id);
                match self.child_nodes(id).first() {
                    None => Ok(self.add_stmt(StmtKind::Empty, span)),
                    Some(&expr_node) => {
                        let expr = self.lower_expr(expr_node)?;
                        Ok(self.add_stmt(StmtKind::Expr(expr), span))
                    }
                }
            }
            "selection-statement" => self.lower_selection(id),
            "iteration-statement" => self.lower_iteration(id),
            "jump-statement" => self.lower_jump(id),
            "labeled-statement" => self.lower_labeled(id),
            other => Err(self.unsupported(id, &format!("unsupported statement `{}`", other))),
        }
    }

    fn lower_selection(&mut self, id: PNodeId) -> Result<StmtId> {
        let span = self.span(id);
        let first = self.child_tokens(id)[0].to_string();
        if first == "switch" {
            return Err(self.unsupported(id, "switch statements are not supported"));
        }

        let kids = self.child_nodes(id);
        let cond = self.lower_condition(kids[0])?;
        let then_stmt = self.lower_statement(kids[1])?;
        let else_stmt = match kids.get(2) {
            None => None,
            Some(&e) => Some(self.lower_statement(e)?),
        };
        Ok(self.add_stmt(
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            },
            span,
        ))
    }

    fn lower_iteration(&mut self, id: PNodeId) -> Result<StmtId> {
        let span = self.span(id);
        let first = self.child_tokens(id)[0].to_string();
        match first.as_str() {
            "while" => {
                let kids = self.child_nodes(id);
                let cond = self.lower_condition(kids[0])?;
                let body = self.lower_loop_body(kids[1])?;
                Ok(self.add_stmt(StmtKind::While { cond, body }, span))
            }
            "do" => {
                let kids = self.child_nodes(id);
                let body = self.lower_loop_body(kids[0])?;
                let cond = self.lower_condition(kids[1])?;
                Ok(self.add_stmt(StmtKind::DoWhile { body, cond }, span))
            }
            "for" => self.lower_for(id, span),
            other => Err(self.unsupported(id, &format!("unsupported loop `{}`", other))),
        }
    }

    fn lower_for(&mut self, id: PNodeId, span: Span) -> Result<StmtId> {
        // Children between `(` and `)` are the header; the trailing child
        // is the body. A declaration-form init carries its own `;`, so the
        // remaining header is split on the `;` tokens that are direct
        // children of this node.
        let children = self.children(id).to_vec();
        let open = children
            .iter()
            .position(|c| matches!(c, PChild::Token(t) if self.token_text(*t) == "("))
            .unwrap();
        let close = children
            .iter()
            .rposition(|c| matches!(c, PChild::Token(t) if self.token_text(*t) == ")"))
            .unwrap();
        let header = &children[open + 1..close];
        let body_node = match children[close + 1] {
            PChild::Node(n) => n,
            PChild::Token(_) => return Err(self.unsupported(id, "malformed for statement")),
        };

        // The loop (and a declaration-form init) gets its own scope.
        self.scopes.push();
        let result = (|| {
            let mut init = None;
            let mut segments: Vec<Option<PNodeId>> = Vec::new();
            let mut current: Option<PNodeId> = None;
            let mut header = header.iter().peekable();

            if let Some(PChild::Node(n)) = header.peek() {
                if self.rule(*n) == "declaration" {
                    let n = *n;
                    header.next();
                    let mut decls = Vec::new();
                    self.lower_local_declaration(n, &mut decls)?;
                    init = Some(ForInit::Decls(decls));
                }
            }

            for child in header {
                match child {
                    PChild::Token(t) if self.token_text(*t) == ";" => {
                        segments.push(current.take());
                    }
                    PChild::Node(n) => current = Some(*n),
                    PChild::Token(_) => {}
                }
            }
            segments.push(current.take());

            // Expression-form init occupies the first segment.
            let (cond_node, step_node) = if init.is_some() {
                (segments.first().copied().flatten(), segments.get(1).copied().flatten())
            } else {
                if let Some(first) = segments.first().copied().flatten() {
                    init = Some(ForInit::Expr(self.lower_expr(first)?));
                }
                (segments.get(1).copied().flatten(), segments.get(2).copied().flatten())
            };

            let cond = match cond_node {
                None => None,
                Some(n) => Some(self.lower_condition(n)?),
            };
            let step = match step_node {
                None => None,
                Some(n) => Some(self.lower_expr(n)?),
            };
            let body = self.lower_loop_body(body_node)?;
            Ok(self.add_stmt(
                StmtKind::For {
                    init,
                    cond,
                    step,
                    body,
                },
                span,
            ))
        })();
        self.scopes.pop();
        result
    }

    fn lower_loop_body(&mut self, id: PNodeId) -> Result<StmtId> {
        self.loop_depth += 1;
        let result = self.lower_statement(id);
        self.loop_depth -= 1;
        result
    }

    fn lower_jump(&mut self, id: PNodeId) -> Result<StmtId> {
        let span = self.span(id);
        let first = self.child_tokens(id)[0].to_string();
        match first.as_str() {
            "goto" => Err(self.unsupported(id, "goto is not supported")),
            "break" => {
                if self.loop_depth == 0 {
                    return Err(SemaError::new(
                        SemaErrorKind::BreakOutsideLoop,
                        span,
                        "break outside of a loop",
                    ));
                }
                Ok(self.add_stmt(StmtKind::Break, span))
            }
            "continue" => {
                if self.loop_depth == 0 {
                    return Err(SemaError::new(
                        SemaErrorKind::ContinueOutsideLoop,
                        span,
                        "continue outside of a loop",
                    ));
                }
                Ok(self.add_stmt(StmtKind::Continue, span))
            }
            "return" => {
                let expr_node = self.child_nodes(id).first().copied();
                let void = self.tu.types.void();
                match expr_node {
                    None => {
                        if self.cur_ret != void {
                            return Err(SemaError::new(
                                SemaErrorKind::ReturnTypeMismatch,
                                span,
                                "non-void function must return a value",
                            ));
                        }
                        Ok(self.add_stmt(StmtKind::Return(None), span))
                    }
                    Some(e) => {
                        if self.cur_ret == void {
                            return Err(SemaError::new(
                                SemaErrorKind::ReturnTypeMismatch,
                                span,
                                "void function may not return a value",
                            ));
                        }
                        let expr = self.lower_expr(e)?;
                        let ety = self.tu.expr(expr).ty;
                        if !types::is_arithmetic(&self.tu.types, ety) {
                            return Err(SemaError::new(
                                SemaErrorKind::ReturnTypeMismatch,
                                span,
                                "returned value has no conversion to the return type",
                            ));
                        }
                        Ok(self.add_stmt(StmtKind::Return(Some(expr)), span))
                    }
                }
            }
            other => Err(self.unsupported(id, &format!("unsupported jump `{}`", other))),
        }
    }

    fn lower_labeled(&mut self, id: PNodeId) -> Result<StmtId> {
        let span = self.span(id);
        let first_token = match self.children(id)[0] {
            PChild::Token(t) => t,
            PChild::Node(_) => return Err(self.unsupported(id, "malformed label")),
        };
        match self.token_text(first_token) {
            "case" | "default" => Err(self.unsupported(id, "switch labels are not supported")),
            name => {
                let name = name.to_string();
                let stmt = self.lower_statement(self.child_nodes(id)[0])?;
                Ok(self.add_stmt(StmtKind::Labeled { name, stmt }, span))
            }
        }
    }

    pub(crate) fn add_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        self.tu.add_stmt(Stmt { kind, span })
    }

    /// Declared parameter types of a function, defined or not.
    pub(crate) fn func_param_types(&self, id: FuncId) -> &[TypeId] {
        &self.tu.functions[id.0 as usize].param_types
    }
}
