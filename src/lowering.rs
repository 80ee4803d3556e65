//! AST lowering for generated sources
//!
//! Parses one source file with oxc, strips TypeScript-only syntax, lowers
//! markup to hyperscript calls and prints the program back out. This is the
//! primary path of the transformer; a file oxc cannot parse falls back to the
//! text-level passes in [`crate::types`] and [`crate::markup`].
//!
//! ```text
//! source -> Parser -> TypeStripper -> MarkupLowerer -> Codegen -> code
//! ```

use oxc_allocator::{Allocator, Box as ArenaBox, CloneIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_ast_visit::walk_mut::{
    walk_arrow_function_expression, walk_call_expression, walk_class, walk_expression,
    walk_formal_parameters, walk_function, walk_new_expression, walk_simple_assignment_target,
    walk_statements, walk_tagged_template_expression, walk_variable_declarator,
};
use oxc_ast_visit::VisitMut;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_span::SPAN;
use oxc_syntax::scope::ScopeFlags;

use crate::lexer::is_valid_identifier;
use crate::markup::{decode_entities, jsx_text, FACTORY, FRAGMENT};

/// Bracket and tag nesting beyond which sources are not handed to the
/// recursive-descent parser.
pub const MAX_PARSE_NESTING: usize = 128;

/// Output of a successful lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lowered {
    pub code: String,
    /// Constructs that were dropped instead of lowered.
    pub diagnostics: Vec<String>,
}

/// Why a source could not take the AST path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LowerError {
    TooDeep(usize),
    Parse(Vec<String>),
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

fn source_type_for(path: &str) -> SourceType {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "ts" | "mts" | "cts" => SourceType::default().with_typescript(true),
        "tsx" => SourceType::default().with_typescript(true).with_jsx(true),
        _ => SourceType::default().with_jsx(true),
    }
}

/// Lower one source file. The extension of `path` selects the dialect.
pub fn lower_source(path: &str, source: &str) -> Result<Lowered, LowerError> {
    let depth = nesting_depth(source);
    if depth > MAX_PARSE_NESTING {
        return Err(LowerError::TooDeep(depth));
    }

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(path)).parse();
    if !ret.errors.is_empty() {
        return Err(LowerError::Parse(
            ret.errors.iter().map(|e| e.to_string()).collect(),
        ));
    }
    let mut program = ret.program;

    let mut stripper = TypeStripper::new(&allocator);
    stripper.visit_program(&mut program);

    let mut lowerer = MarkupLowerer::new(&allocator);
    lowerer.visit_program(&mut program);

    Ok(Lowered {
        code: Codegen::new().build(&program).code,
        diagnostics: stripper.diagnostics,
    })
}

/// Upper bound on how deeply brackets and markup tags nest in `source`.
///
/// Strings and comments are not skipped, so a stray `<` in a comparison counts
/// as an opening tag; the estimate only ever errs high.
pub fn nesting_depth(source: &str) -> usize {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut max = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        let next = bytes.get(i + 1).copied();
        match b {
            b'(' | b'[' | b'{' => {
                depth += 1;
                max = max.max(depth);
            }
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'<' if next == Some(b'/') => depth = depth.saturating_sub(1),
            b'<' if next.is_some_and(|c| c.is_ascii_alphabetic() || c == b'>') => {
                depth += 1;
                max = max.max(depth);
            }
            b'/' if next == Some(b'>') => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPE STRIPPER
// Removes TypeScript-only syntax and lowers enums and parameter properties
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TypeStripper<'a> {
    ast: AstBuilder<'a>,
    diagnostics: Vec<String>,
}

impl<'a> TypeStripper<'a> {
    pub fn new(allocator: &'a Allocator) -> Self {
        Self {
            ast: AstBuilder::new(allocator),
            diagnostics: Vec::new(),
        }
    }

    /// Lower `stmt` in place. Returns false if it should be removed.
    fn lower_statement(&mut self, stmt: &mut Statement<'a>) -> bool {
        match stmt {
            Statement::TSEnumDeclaration(decl) => {
                if decl.declare {
                    return false;
                }
                let lowered = self.lower_enum(decl);
                *stmt = Statement::VariableDeclaration(lowered);
                true
            }
            Statement::ExportNamedDeclaration(export) => {
                if export.export_kind.is_type() {
                    return false;
                }
                if let Some(Declaration::TSEnumDeclaration(decl)) = &export.declaration {
                    if decl.declare {
                        return false;
                    }
                    let lowered = self.lower_enum(decl);
                    export.declaration = Some(Declaration::VariableDeclaration(lowered));
                }
                if !export.specifiers.is_empty() {
                    export
                        .specifiers
                        .retain(|s| !s.export_kind.is_type());
                    if export.specifiers.is_empty() && export.declaration.is_none() {
                        return false;
                    }
                }
                !export
                    .declaration
                    .as_ref()
                    .is_some_and(is_type_only_declaration)
            }
            Statement::ImportDeclaration(import) => {
                if import.import_kind.is_type() {
                    return false;
                }
                if let Some(specifiers) = &mut import.specifiers {
                    let had_any = !specifiers.is_empty();
                    specifiers.retain(|s| {
                        !matches!(s, ImportDeclarationSpecifier::ImportSpecifier(named) if named.import_kind.is_type())
                    });
                    if had_any && specifiers.is_empty() {
                        return false;
                    }
                }
                true
            }
            Statement::ExportDefaultDeclaration(export) => match &export.declaration {
                ExportDefaultDeclarationKind::ClassDeclaration(class) => !class.declare,
                kind => !kind.is_typescript_syntax(),
            },
            Statement::ClassDeclaration(class) => !class.declare,
            _ => !stmt.is_typescript_syntax(),
        }
    }

    /// `enum E { A, B = 5, C }` -> `const E = Object.freeze({ A: 0, B: 5, C: 6 })`.
    /// Auto-numbering continues from the last numeric initializer.
    fn lower_enum(&mut self, decl: &TSEnumDeclaration<'a>) -> ArenaBox<'a, VariableDeclaration<'a>> {
        let mut next: Option<f64> = Some(0.0);
        let mut props = self.ast.vec();

        for member in &decl.body.members {
            let key = match &member.id {
                TSEnumMemberName::Identifier(id) => {
                    self.ast.property_key_static_identifier(SPAN, id.name)
                }
                TSEnumMemberName::String(s) | TSEnumMemberName::ComputedString(s) => {
                    self.string_key(s.value.as_str())
                }
                TSEnumMemberName::ComputedTemplateString(t) => match t.quasis.first() {
                    Some(quasi) => self.string_key(quasi.value.raw.as_str()),
                    None => continue,
                },
            };

            let value = match &member.initializer {
                Some(init) => {
                    next = numeric_value(init).map(|n| n + 1.0);
                    init.clone_in(self.ast.allocator)
                }
                None => match next {
                    Some(n) => {
                        next = Some(n + 1.0);
                        self.ast
                            .expression_numeric_literal(SPAN, n, None, NumberBase::Decimal)
                    }
                    None => {
                        self.diagnostics.push(format!(
                            "enum {} member without a value after a non-numeric initializer",
                            decl.id.name
                        ));
                        self.ast.expression_identifier(SPAN, "undefined")
                    }
                },
            };

            props.push(self.ast.object_property_kind_object_property(
                SPAN,
                PropertyKind::Init,
                key,
                value,
                false,
                false,
                false,
            ));
        }

        let freeze = Expression::from(self.ast.member_expression_static(
            SPAN,
            self.ast.expression_identifier(SPAN, "Object"),
            self.ast.identifier_name(SPAN, "freeze"),
            false,
        ));
        let mut args = self.ast.vec();
        args.push(Argument::from(self.ast.expression_object(SPAN, props)));
        let init = self.ast.expression_call(
            SPAN,
            freeze,
            None::<ArenaBox<TSTypeParameterInstantiation>>,
            args,
            false,
        );

        let mut declarations = self.ast.vec();
        declarations.push(self.ast.variable_declarator(
            SPAN,
            VariableDeclarationKind::Const,
            self.ast.binding_pattern_binding_identifier(SPAN, decl.id.name),
            None::<ArenaBox<TSTypeAnnotation>>,
            Some(init),
            false,
        ));
        self.ast
            .alloc_variable_declaration(SPAN, VariableDeclarationKind::Const, declarations, false)
    }

    fn string_key(&self, value: &str) -> PropertyKey<'a> {
        let atom: &'a str = self.ast.allocator.alloc_str(value);
        if is_valid_identifier(atom) {
            self.ast.property_key_static_identifier(SPAN, atom)
        } else {
            PropertyKey::StringLiteral(self.ast.alloc(self.ast.string_literal(SPAN, atom, None)))
        }
    }

    /// `constructor(private name: string)` assigns `this.name = name` after the
    /// `super(...)` call, or first thing when there is none.
    fn assign_parameter_properties(&self, func: &mut Function<'a>) {
        let names: Vec<String> = func
            .params
            .items
            .iter()
            .filter(|p| p.accessibility.is_some() || p.readonly || p.r#override)
            .filter_map(|p| binding_name(&p.pattern))
            .collect();
        let Some(body) = func.body.as_mut() else {
            return;
        };
        if names.is_empty() {
            return;
        }

        let mut at = body
            .statements
            .iter()
            .position(is_super_call)
            .map_or(0, |i| i + 1);
        for name in names {
            let atom: &'a str = self.ast.allocator.alloc_str(&name);
            let target = self.ast.member_expression_static(
                SPAN,
                self.ast.expression_this(SPAN),
                self.ast.identifier_name(SPAN, atom),
                false,
            );
            let assign = self.ast.expression_assignment(
                SPAN,
                AssignmentOperator::Assign,
                AssignmentTarget::from(SimpleAssignmentTarget::from(target)),
                self.ast.expression_identifier(SPAN, atom),
            );
            body.statements
                .insert(at, self.ast.statement_expression(SPAN, assign));
            at += 1;
        }
    }

    fn unwrap_ts_expression(&self, expr: &Expression<'a>) -> Option<Expression<'a>> {
        let inner = match expr {
            Expression::TSAsExpression(e) => &e.expression,
            Expression::TSSatisfiesExpression(e) => &e.expression,
            Expression::TSTypeAssertion(e) => &e.expression,
            Expression::TSNonNullExpression(e) => &e.expression,
            Expression::TSInstantiationExpression(e) => &e.expression,
            _ => return None,
        };
        Some(inner.clone_in(self.ast.allocator))
    }
}

fn is_type_only_declaration(decl: &Declaration) -> bool {
    match decl {
        Declaration::ClassDeclaration(class) => class.declare,
        other => other.is_typescript_syntax(),
    }
}

fn is_super_call(stmt: &Statement) -> bool {
    matches!(stmt, Statement::ExpressionStatement(s)
        if matches!(&s.expression, Expression::CallExpression(call)
            if matches!(call.callee, Expression::Super(_))))
}

fn binding_name(pattern: &BindingPattern) -> Option<String> {
    match pattern {
        BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
        BindingPattern::AssignmentPattern(assign) => binding_name(&assign.left),
        _ => None,
    }
}

fn numeric_value(expr: &Expression) -> Option<f64> {
    match expr {
        Expression::NumericLiteral(n) => Some(n.value),
        Expression::UnaryExpression(u) if u.operator == UnaryOperator::UnaryNegation => {
            numeric_value(&u.argument).map(|n| -n)
        }
        _ => None,
    }
}

impl<'a> VisitMut<'a> for TypeStripper<'a> {
    fn visit_statements(&mut self, stmts: &mut ArenaVec<'a, Statement<'a>>) {
        let keep: Vec<bool> = stmts
            .iter_mut()
            .map(|stmt| self.lower_statement(stmt))
            .collect();
        let mut keep = keep.into_iter();
        stmts.retain(|_| keep.next().unwrap_or(true));
        walk_statements(self, stmts);
    }

    fn visit_function(&mut self, func: &mut Function<'a>, flags: ScopeFlags) {
        func.type_parameters = None;
        func.this_param = None;
        func.return_type = None;
        func.declare = false;
        walk_function(self, func, flags);
    }

    fn visit_arrow_function_expression(&mut self, arrow: &mut ArrowFunctionExpression<'a>) {
        arrow.type_parameters = None;
        arrow.return_type = None;
        walk_arrow_function_expression(self, arrow);
    }

    fn visit_formal_parameters(&mut self, params: &mut FormalParameters<'a>) {
        for param in params.items.iter_mut() {
            param.type_annotation = None;
            param.optional = false;
            param.accessibility = None;
            param.readonly = false;
            param.r#override = false;
        }
        if let Some(rest) = &mut params.rest {
            rest.type_annotation = None;
        }
        walk_formal_parameters(self, params);
    }

    fn visit_class(&mut self, class: &mut Class<'a>) {
        class.type_parameters = None;
        class.super_type_arguments = None;
        class.implements = self.ast.vec();
        class.r#abstract = false;
        class.declare = false;

        class.body.body.retain(|element| {
            !element.is_typescript_syntax()
                && !matches!(element, ClassElement::PropertyDefinition(p) if p.declare)
        });
        for element in class.body.body.iter_mut() {
            match element {
                ClassElement::MethodDefinition(method) => {
                    if method.kind.is_constructor() {
                        self.assign_parameter_properties(&mut method.value);
                    }
                    method.r#type = MethodDefinitionType::MethodDefinition;
                    method.accessibility = None;
                    method.optional = false;
                    method.r#override = false;
                }
                ClassElement::PropertyDefinition(prop) => {
                    prop.r#type = PropertyDefinitionType::PropertyDefinition;
                    prop.type_annotation = None;
                    prop.accessibility = None;
                    prop.optional = false;
                    prop.definite = false;
                    prop.readonly = false;
                    prop.r#override = false;
                }
                ClassElement::AccessorProperty(prop) => {
                    prop.type_annotation = None;
                    prop.accessibility = None;
                    prop.definite = false;
                    prop.r#override = false;
                }
                _ => {}
            }
        }
        walk_class(self, class);
    }

    fn visit_variable_declarator(&mut self, decl: &mut VariableDeclarator<'a>) {
        decl.type_annotation = None;
        decl.definite = false;
        walk_variable_declarator(self, decl);
    }

    fn visit_catch_parameter(&mut self, param: &mut CatchParameter<'a>) {
        param.type_annotation = None;
        self.visit_binding_pattern(&mut param.pattern);
    }

    fn visit_call_expression(&mut self, call: &mut CallExpression<'a>) {
        call.type_arguments = None;
        walk_call_expression(self, call);
    }

    fn visit_new_expression(&mut self, new: &mut NewExpression<'a>) {
        new.type_arguments = None;
        walk_new_expression(self, new);
    }

    fn visit_tagged_template_expression(&mut self, tagged: &mut TaggedTemplateExpression<'a>) {
        tagged.type_arguments = None;
        walk_tagged_template_expression(self, tagged);
    }

    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        if let Some(inner) = self.unwrap_ts_expression(expr) {
            *expr = inner;
            self.visit_expression(expr);
            return;
        }
        walk_expression(self, expr);
    }

    fn visit_simple_assignment_target(&mut self, target: &mut SimpleAssignmentTarget<'a>) {
        let inner = match target {
            SimpleAssignmentTarget::TSAsExpression(e) => Some(&e.expression),
            SimpleAssignmentTarget::TSSatisfiesExpression(e) => Some(&e.expression),
            SimpleAssignmentTarget::TSNonNullExpression(e) => Some(&e.expression),
            SimpleAssignmentTarget::TSTypeAssertion(e) => Some(&e.expression),
            _ => None,
        }
        .map(|e| e.clone_in(self.ast.allocator));

        match inner {
            Some(Expression::Identifier(id)) => {
                *target = SimpleAssignmentTarget::AssignmentTargetIdentifier(id);
            }
            Some(Expression::StaticMemberExpression(member)) => {
                *target = SimpleAssignmentTarget::StaticMemberExpression(member);
            }
            Some(Expression::ComputedMemberExpression(member)) => {
                *target = SimpleAssignmentTarget::ComputedMemberExpression(member);
            }
            Some(Expression::PrivateFieldExpression(member)) => {
                *target = SimpleAssignmentTarget::PrivateFieldExpression(member);
            }
            _ => {}
        }
        walk_simple_assignment_target(self, target);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKUP LOWERER
// Transforms markup into __h(tag, props, [children]) calls
// ═══════════════════════════════════════════════════════════════════════════════

pub struct MarkupLowerer<'a> {
    ast: AstBuilder<'a>,
}

impl<'a> MarkupLowerer<'a> {
    pub fn new(allocator: &'a Allocator) -> Self {
        Self {
            ast: AstBuilder::new(allocator),
        }
    }

    fn lower_element(&mut self, element: &JSXElement<'a>) -> Expression<'a> {
        let tag = self.tag(&element.opening_element.name);

        let mut props = self.ast.vec();
        for item in &element.opening_element.attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let value = match &attr.value {
                        None => self.ast.expression_boolean_literal(SPAN, true),
                        Some(JSXAttributeValue::StringLiteral(s)) => {
                            let text = decode_entities(s.value.as_str());
                            let atom: &'a str = self.ast.allocator.alloc_str(&text);
                            self.ast.expression_string_literal(SPAN, atom, None)
                        }
                        Some(JSXAttributeValue::ExpressionContainer(container)) => {
                            match self.lower_expression(&container.expression) {
                                Some(expr) => expr,
                                None => continue,
                            }
                        }
                        Some(JSXAttributeValue::Element(el)) => self.lower_element(el),
                        Some(JSXAttributeValue::Fragment(frag)) => self.lower_fragment(frag),
                    };
                    let key = self.prop_key(&attr.name);
                    props.push(self.ast.object_property_kind_object_property(
                        SPAN,
                        PropertyKind::Init,
                        key,
                        value,
                        false,
                        false,
                        false,
                    ));
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    let mut argument = spread.argument.clone_in(self.ast.allocator);
                    self.visit_expression(&mut argument);
                    props.push(self.ast.object_property_kind_spread_property(SPAN, argument));
                }
            }
        }

        let props = if props.is_empty() {
            self.ast.expression_null_literal(SPAN)
        } else {
            self.ast.expression_object(SPAN, props)
        };
        let children = self.lower_children(&element.children);
        self.factory_call(tag, props, children)
    }

    fn lower_fragment(&mut self, fragment: &JSXFragment<'a>) -> Expression<'a> {
        let tag = self.ast.expression_identifier(SPAN, FRAGMENT);
        let props = self.ast.expression_null_literal(SPAN);
        let children = self.lower_children(&fragment.children);
        self.factory_call(tag, props, children)
    }

    fn lower_children(
        &mut self,
        children: &ArenaVec<'a, JSXChild<'a>>,
    ) -> ArenaVec<'a, ArrayExpressionElement<'a>> {
        let mut out = self.ast.vec();
        for child in children {
            match child {
                JSXChild::Text(t) => {
                    if let Some(text) = jsx_text(t.raw.unwrap_or(t.value).as_str()) {
                        let atom: &'a str = self.ast.allocator.alloc_str(&text);
                        out.push(ArrayExpressionElement::from(
                            self.ast.expression_string_literal(SPAN, atom, None),
                        ));
                    }
                }
                JSXChild::Element(el) => {
                    out.push(ArrayExpressionElement::from(self.lower_element(el)));
                }
                JSXChild::Fragment(frag) => {
                    out.push(ArrayExpressionElement::from(self.lower_fragment(frag)));
                }
                JSXChild::ExpressionContainer(container) => {
                    if let Some(expr) = self.lower_expression(&container.expression) {
                        out.push(ArrayExpressionElement::from(expr));
                    }
                }
                JSXChild::Spread(spread) => {
                    let mut argument = spread.expression.clone_in(self.ast.allocator);
                    self.visit_expression(&mut argument);
                    out.push(self.ast.array_expression_element_spread_element(SPAN, argument));
                }
            }
        }
        out
    }

    /// `None` for an empty `{}` or a comment-only container.
    fn lower_expression(&mut self, expr: &JSXExpression<'a>) -> Option<Expression<'a>> {
        let mut lowered = expr.as_expression()?.clone_in(self.ast.allocator);
        self.visit_expression(&mut lowered);
        Some(lowered)
    }

    fn factory_call(
        &self,
        tag: Expression<'a>,
        props: Expression<'a>,
        children: ArenaVec<'a, ArrayExpressionElement<'a>>,
    ) -> Expression<'a> {
        let mut args = self.ast.vec();
        args.push(Argument::from(tag));
        args.push(Argument::from(props));
        args.push(Argument::from(self.ast.expression_array(SPAN, children)));
        self.ast.expression_call(
            SPAN,
            self.ast.expression_identifier(SPAN, FACTORY),
            None::<ArenaBox<TSTypeParameterInstantiation>>,
            args,
            false,
        )
    }

    /// Intrinsic tags become strings; components stay references.
    fn tag(&self, name: &JSXElementName<'a>) -> Expression<'a> {
        match name {
            JSXElementName::Identifier(id) => {
                self.ast.expression_string_literal(SPAN, id.name, None)
            }
            JSXElementName::IdentifierReference(id) => self.ast.expression_identifier(SPAN, id.name),
            JSXElementName::NamespacedName(ns) => {
                let text = format!("{}:{}", ns.namespace.name, ns.name.name);
                let atom: &'a str = self.ast.allocator.alloc_str(&text);
                self.ast.expression_string_literal(SPAN, atom, None)
            }
            JSXElementName::MemberExpression(member) => self.member_tag(member),
            JSXElementName::ThisExpression(_) => self.ast.expression_this(SPAN),
        }
    }

    fn member_tag(&self, member: &JSXMemberExpression<'a>) -> Expression<'a> {
        let object = match &member.object {
            JSXMemberExpressionObject::IdentifierReference(id) => {
                self.ast.expression_identifier(SPAN, id.name)
            }
            JSXMemberExpressionObject::MemberExpression(inner) => self.member_tag(inner),
            JSXMemberExpressionObject::ThisExpression(_) => self.ast.expression_this(SPAN),
        };
        Expression::from(self.ast.member_expression_static(
            SPAN,
            object,
            self.ast.identifier_name(SPAN, member.property.name),
            false,
        ))
    }

    fn prop_key(&self, name: &JSXAttributeName<'a>) -> PropertyKey<'a> {
        let text = match name {
            JSXAttributeName::Identifier(id) => id.name.to_string(),
            JSXAttributeName::NamespacedName(ns) => {
                format!("{}:{}", ns.namespace.name, ns.name.name)
            }
        };
        let atom: &'a str = self.ast.allocator.alloc_str(&text);
        if is_valid_identifier(atom) {
            self.ast.property_key_static_identifier(SPAN, atom)
        } else {
            PropertyKey::StringLiteral(self.ast.alloc(self.ast.string_literal(SPAN, atom, None)))
        }
    }
}

impl<'a> VisitMut<'a> for MarkupLowerer<'a> {
    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        match expr {
            Expression::JSXElement(element) => {
                let lowered = self.lower_element(element);
                *expr = lowered;
            }
            Expression::JSXFragment(fragment) => {
                let lowered = self.lower_fragment(fragment);
                *expr = lowered;
            }
            _ => walk_expression(self, expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(path: &str, source: &str) -> String {
        match lower_source(path, source) {
            Ok(lowered) => lowered.code,
            Err(e) => panic!("{:?}", e),
        }
    }

    /// Drop whitespace outside double-quoted strings so assertions do not
    /// depend on printer layout.
    fn squash(code: &str) -> String {
        let mut out = String::with_capacity(code.len());
        let mut in_string = false;
        let mut escaped = false;
        for c in code.chars() {
            if in_string {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
            } else if c == '"' {
                in_string = true;
                out.push(c);
            } else if !c.is_whitespace() {
                out.push(c);
            }
        }
        out
    }

    fn assert_lowers_to(path: &str, source: &str, expected: &str) {
        let code = lower(path, source);
        assert!(
            squash(&code).contains(&squash(expected)),
            "expected {:?} in:\n{}",
            expected,
            code
        );
    }

    #[test]
    fn test_markup_lowered() {
        assert_lowers_to(
            "App.jsx",
            "const a = <div className=\"x\" data-id={1} hidden>Hi {name}</div>;",
            r#"const a = __h("div", { className: "x", "data-id": 1, hidden: true }, ["Hi ", name]);"#,
        );
        assert_lowers_to(
            "App.jsx",
            "const b = <><Item {...rest} /><ui.Panel.Body /></>;",
            "const b = __h(__Fragment, null, [__h(Item, { ...rest }, []), __h(ui.Panel.Body, null, [])]);",
        );
    }

    #[test]
    fn test_markup_text_and_containers() {
        assert_lowers_to(
            "App.jsx",
            "const c = <p>\n  Tom &amp; Jerry\n  {/* note */}\n  {}\n</p>;",
            r#"const c = __h("p", null, ["Tom & Jerry"]);"#,
        );
        assert_lowers_to(
            "App.jsx",
            "const d = <a title=\"&lt;b&gt;\">{items.map((i, n) => <li key={n}>{i}</li>)}</a>;",
            r#"const d = __h("a", { title: "<b>" }, [items.map((i, n) => __h("li", { key: n }, [i]))]);"#,
        );
    }

    #[test]
    fn test_type_only_statements_removed() {
        let code = lower(
            "types.ts",
            "import type { A } from './a';\nimport { type B, c } from './b';\nimport { type D } from './d';\ninterface P { x: number }\ntype Q = string;\ndeclare const env: string;\nexport type { P };\nexport const v: number = 1;\n",
        );
        assert!(!code.contains("./a"));
        assert!(!code.contains("./d"));
        assert!(code.contains("import { c } from"));
        assert!(!code.contains("interface"));
        assert!(!code.contains("type "));
        assert!(!code.contains("env"));
        assert!(squash(&code).contains("exportconstv=1;"));
    }

    #[test]
    fn test_annotations_and_assertions_removed() {
        assert_lowers_to(
            "util.ts",
            "function first<T>(xs: T[], fallback?: T): T | undefined { const a = xs[0] as T; return a ?? fallback!; }",
            "function first(xs, fallback) { const a = xs[0]; return a ?? fallback; }",
        );
        assert_lowers_to(
            "util.ts",
            "const cfg = { port: 3000 } satisfies Config; const n = <number>raw; el!.value = 1; count! = 2;",
            "const cfg = { port: 3000 }; const n = raw; el.value = 1; count = 2;",
        );
        assert_lowers_to(
            "util.ts",
            "const [s, set] = useState<string[]>([]); try { go(); } catch (e: unknown) { fail(e); }",
            "const [s, set] = useState([]); try { go(); } catch (e) { fail(e); }",
        );
    }

    #[test]
    fn test_generic_async_arrow() {
        assert_lowers_to(
            "api.tsx",
            "const load = async <T,>(url: string): Promise<T> => fetch(url);",
            "const load = async (url) => fetch(url);",
        );
    }

    #[test]
    fn test_enum_lowered() {
        assert_lowers_to(
            "e.ts",
            "enum Color { Red, Green = 5, Blue }",
            "const Color = Object.freeze({ Red: 0, Green: 5, Blue: 6 });",
        );
        assert_lowers_to(
            "e.ts",
            "export enum Dir { Up = 1, 'Down-Left' = 4, Right }",
            r#"export const Dir = Object.freeze({ Up: 1, "Down-Left": 4, Right: 5 });"#,
        );
        let code = lower("e.ts", "declare enum Hidden { A }\nconst x = 1;");
        assert!(!code.contains("Hidden"));
    }

    #[test]
    fn test_class_members() {
        assert_lowers_to(
            "svc.ts",
            "abstract class Base<T> implements Svc { abstract run(): void; protected readonly name: number = 1; declare meta: T; [key: string]: unknown; }",
            "class Base { name = 1; }",
        );
        assert_lowers_to(
            "svc.ts",
            "class Store extends Base { constructor(private api: Api, public readonly size = 1, plain: number) { super(plain); this.init(); } }",
            "class Store extends Base { constructor(api, size = 1, plain) { super(plain); this.api = api; this.size = size; this.init(); } }",
        );
        assert_lowers_to(
            "svc.ts",
            "class Cache { constructor(public key: string) {} }",
            "class Cache { constructor(key) { this.key = key; } }",
        );
    }

    #[test]
    fn test_parse_errors_reported() {
        match lower_source("Bad.jsx", "const x = <div>;") {
            Err(LowerError::Parse(errors)) => assert!(!errors.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_deep_nesting_refused_before_parse() {
        let source = format!("x = {}1{};", "(".repeat(5000), ")".repeat(5000));
        assert!(matches!(
            lower_source("deep.js", &source),
            Err(LowerError::TooDeep(5000))
        ));
        assert_eq!(nesting_depth("f(a[0], { b: <p>{c}</p> })"), 4);
        assert_eq!(nesting_depth("<br/><br/>"), 1);
    }
}
