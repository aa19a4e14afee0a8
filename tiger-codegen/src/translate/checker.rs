//! The translator: type-checks and simultaneously translates a Tiger AST
//! into IR fragments.
//!
//! Grounded on
//! `examples/original_source/src/semantic_analysis/analyzers.py` for every
//! type-checking rule, and on
//! `examples/original_source/src/intermediate_representation/translate.py`
//! for the corresponding IR shape (via `crate::translate::builders`). The
//! two source files are themselves unconnected (`analyzers.py`'s
//! `TypedExpression` never carries a real `TranslatedExpression`); this
//! translator is their merge, producing one typed-and-translated value per
//! AST node, as `spec.md` §4.D describes.
//!
//! Escape analysis is not reproduced as a separate pass: the source splits
//! it into `escape.py`, used by neither `analyzers.py` nor `translate.py`.
//! Every formal and local here is conservatively marked escaping, which is
//! always correct (an `InFrame` access works whether or not a variable is
//! actually captured by a nested function) at the cost of never placing a
//! source-level variable in a register.

use crate::result::{CompileResult, FrontendError, Line};
use crate::symbol::SymbolTable;
use crate::temp::{Label, TempFactory, TempMap};
use crate::translate::ast;
use crate::translate::builders;
use crate::translate::environment::{
    base_type_environment, base_value_environment, EnvironmentEntry, FunctionEntry, VariableEntry,
};
use crate::translate::fragment::FragmentManager;
use crate::translate::level::Level;
use crate::translate::translated_expr::TranslatedExpr;
use crate::translate::types::{are_types_equal, Field as TypeField, Type};

/// One AST node's translation: its IR and its checked semantic type.
pub struct TypedExpr {
    pub expr: TranslatedExpr,
    pub ty: Type,
}

impl TypedExpr {
    fn new(expr: TranslatedExpr, ty: Type) -> Self {
        TypedExpr { expr, ty }
    }
}

fn err(message: impl Into<String>, line: Line) -> FrontendError {
    FrontendError::semantic(message, line)
}

/// Owns every piece of state threaded through one compilation: fresh temps
/// and labels, the fragment list being built, and the nested value/type
/// environments. Not a singleton — callers construct one per compilation
/// (§9).
pub struct Translator {
    pub factory: TempFactory,
    pub map: TempMap,
    pub fragments: FragmentManager,
    value_env: SymbolTable<EnvironmentEntry>,
    type_env: SymbolTable<Type>,
    break_labels: Vec<Label>,
}

impl Translator {
    pub fn new(factory: TempFactory, map: TempMap) -> Self {
        let outermost = Level::Outermost;
        let value_env = base_value_environment(&outermost);
        let type_env = base_type_environment();
        Translator { factory, map, fragments: FragmentManager::new(), value_env, type_env, break_labels: Vec::new() }
    }

    /// Translates the whole program as the body of `tigermain`.
    pub fn translate_program(mut self, body: &ast::Expr) -> CompileResult<FragmentManager> {
        let level = crate::translate::level::base_program_level(&mut self.factory);
        let typed = self.translate_expression(&level, body)?;
        builders::proc_entry_exit(&mut self.factory, &self.map, &level, typed.expr, &mut self.fragments);
        Ok(self.fragments)
    }

    fn translate_variable(&mut self, level: &Level, variable: &ast::Variable) -> CompileResult<TypedExpr> {
        match variable {
            ast::Variable::Simple { name, line } => {
                let entry = self.value_env.find(name).cloned();
                match entry {
                    Some(EnvironmentEntry::Variable(v)) => {
                        let expr = builders::simple_variable(&self.map, &v.access, level);
                        Ok(TypedExpr::new(expr, v.ty))
                    }
                    _ => Err(err(format!("Undefined variable {name}"), *line)),
                }
            }
            ast::Variable::Field { var, name, line } => {
                let base = self.translate_variable(level, var)?;
                match &base.ty {
                    Type::Record(data) => {
                        let fields = data.fields.borrow();
                        let index = fields.iter().position(|f| &f.name == name);
                        match index {
                            Some(i) => {
                                let field_type = fields[i].ty.clone();
                                drop(fields);
                                let expr = builders::field_variable(&mut self.factory, base.expr, i as i64);
                                Ok(TypedExpr::new(expr, field_type))
                            }
                            None => Err(err(format!("Unknown record field name {name} for variable"), *line)),
                        }
                    }
                    _ => Err(err(
                        format!("Trying to access the {name} field of a variable that is not a record"),
                        var.line(),
                    )),
                }
            }
            ast::Variable::Subscript { var, index, line } => {
                let base = self.translate_variable(level, var)?;
                let element_type = match &base.ty {
                    Type::Array(data) => data.element.borrow().clone(),
                    _ => {
                        return Err(err(
                            "Trying to access a subscript of a variable that is not an array",
                            var.line(),
                        ))
                    }
                };
                let idx = self.translate_expression(level, index)?;
                if !matches!(idx.ty, Type::Int) {
                    return Err(err("Array subscript must be an Integer", index.line()));
                }
                let _ = line;
                let expr = builders::subscript_variable(&mut self.factory, base.expr, idx.expr);
                Ok(TypedExpr::new(expr, element_type))
            }
        }
    }

    fn translate_expression(&mut self, level: &Level, expression: &ast::Expr) -> CompileResult<TypedExpr> {
        match expression {
            ast::Expr::Var(var) => self.translate_variable(level, var),
            ast::Expr::Nil(_) => Ok(TypedExpr::new(builders::nil_expression(), Type::Nil)),
            ast::Expr::Int(n, _) => Ok(TypedExpr::new(builders::integer_expression(*n), Type::Int)),
            ast::Expr::Str(s, _) => {
                let expr = builders::string_expression(&mut self.factory, &mut self.fragments, s.clone());
                Ok(TypedExpr::new(expr, Type::String))
            }
            ast::Expr::Call { func, args, line } => self.translate_call(level, func, args, *line),
            ast::Expr::Op { oper, left, right, line } => self.translate_op(level, *oper, left, right, *line),
            ast::Expr::Record { type_name, fields, line } => {
                self.translate_record(level, type_name, fields, *line)
            }
            ast::Expr::Seq(exprs, _) => {
                let mut last_type = Type::Void;
                let mut translated = Vec::with_capacity(exprs.len());
                for e in exprs {
                    let t = self.translate_expression(level, e)?;
                    last_type = t.ty.clone();
                    translated.push(t.expr);
                }
                let expr = builders::sequence_expression(&mut self.factory, translated);
                Ok(TypedExpr::new(expr, last_type))
            }
            ast::Expr::Assign { var, exp, line } => self.translate_assign(level, var, exp, *line),
            ast::Expr::If { test, then_branch, else_branch, line } => {
                self.translate_if(level, test, then_branch, else_branch.as_deref(), *line)
            }
            ast::Expr::While { test, body, line } => self.translate_while(level, test, body, *line),
            ast::Expr::Break(line) => {
                if !self.value_env.is_closest_scope_a_loop() {
                    return Err(err("Break expression must be inside a For or While loop", *line));
                }
                let label = self.break_labels.last().cloned().expect("loop scope implies a break label");
                Ok(TypedExpr::new(builders::break_expression(label), Type::Void))
            }
            ast::Expr::For { var, lo, hi, body, line } => self.translate_for(level, var, lo, hi, body, *line),
            ast::Expr::Let { decs, body, line } => self.translate_let(level, decs, body, *line),
            ast::Expr::Array { type_name, size, init, line } => {
                self.translate_array(level, type_name, size, init, *line)
            }
            ast::Expr::Empty(_) => Ok(TypedExpr::new(builders::empty_expression(), Type::Void)),
        }
    }

    fn translate_call(
        &mut self,
        level: &Level,
        func: &str,
        args: &[ast::Expr],
        line: Line,
    ) -> CompileResult<TypedExpr> {
        let entry = self.value_env.find(func).cloned();
        let function = match entry {
            Some(EnvironmentEntry::Function(f)) => f,
            Some(EnvironmentEntry::Variable(_)) => {
                return Err(err(format!("Non-function value {func} is not callable"), line))
            }
            None => return Err(err(format!("Undefined function {func}"), line)),
        };
        if args.len() != function.formals.len() {
            return Err(err(
                format!(
                    "Wrong number of arguments in function call to {func}, {} expected, but {} given",
                    function.formals.len(),
                    args.len()
                ),
                line,
            ));
        }
        let mut translated_args = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let t = self.translate_expression(level, arg)?;
            if !are_types_equal(&function.formals[i], &t.ty) {
                return Err(err(format!("Wrong type for argument in position {i} in call to {func}"), line));
            }
            translated_args.push(t.expr);
        }
        let label = function.label.clone();
        let expr = builders::call_expression(
            &self.map,
            &label,
            &function.level,
            level,
            translated_args,
            &mut self.factory,
        );
        Ok(TypedExpr::new(expr, function.result))
    }

    fn translate_op(
        &mut self,
        level: &Level,
        oper: ast::Oper,
        left: &ast::Expr,
        right: &ast::Expr,
        line: Line,
    ) -> CompileResult<TypedExpr> {
        let l = self.translate_expression(level, left)?;
        let r = self.translate_expression(level, right)?;
        use ast::Oper::*;
        match oper {
            Plus | Minus | Times | Divide => {
                if !matches!(l.ty, Type::Int) {
                    return Err(err("Left arithmetic operand must be an Integer", left.line()));
                }
                if !matches!(r.ty, Type::Int) {
                    return Err(err("Right arithmetic operand must be an Integer", right.line()));
                }
                let expr = builders::arithmetic_operation_expression(&mut self.factory, oper, l.expr, r.expr);
                Ok(TypedExpr::new(expr, Type::Int))
            }
            Eq | Neq | Lt | Le | Gt | Ge => {
                if !are_types_equal(&l.ty, &r.ty) {
                    return Err(err("Values must be of the same type to test for equality or order", line));
                }
                if matches!(oper, Lt | Le | Gt | Ge)
                    && !matches!(l.ty, Type::Int)
                    && !matches!(l.ty, Type::String)
                {
                    return Err(err("Values must be Integers or Strings to compare their order", line));
                }
                let expr = if matches!(l.ty, Type::String) {
                    builders::string_conditional_operation_expression(&mut self.factory, oper, l.expr, r.expr)
                } else {
                    builders::conditional_operation_expression(&mut self.factory, oper, l.expr, r.expr)
                };
                Ok(TypedExpr::new(expr, Type::Int))
            }
        }
    }

    fn translate_record(
        &mut self,
        level: &Level,
        type_name: &str,
        fields: &[ast::ExpField],
        line: Line,
    ) -> CompileResult<TypedExpr> {
        let record_type = self.type_env.find(type_name).cloned();
        let record_type = match record_type {
            Some(t) => t,
            None => return Err(err(format!("Undefined record type {type_name}"), line)),
        };
        let record_fields = match &record_type {
            Type::Record(data) => data.fields.borrow().clone(),
            _ => {
                return Err(err(
                    format!("Trying to create a record of type {type_name}, which is not a record type"),
                    line,
                ))
            }
        };
        let mut checked_names = std::collections::HashSet::new();
        let mut by_name = std::collections::HashMap::new();
        for field in fields {
            if !checked_names.insert(field.name.clone()) {
                return Err(err(format!("Repeated field assignment for field {}", field.name), field.line));
            }
            let expected = record_fields.iter().find(|f| f.name == field.name);
            let expected = match expected {
                Some(f) => f.ty.clone(),
                None => return Err(err(format!("Unknown field {} in record creation", field.name), field.line)),
            };
            let t = self.translate_expression(level, &field.exp)?;
            if !are_types_equal(&expected, &t.ty) {
                return Err(err(
                    format!("Assigning value of a wrong type to field {} in record creation", field.name),
                    field.exp.line(),
                ));
            }
            by_name.insert(field.name.clone(), t.expr);
        }
        if checked_names.len() < record_fields.len() {
            return Err(err("Missing field assignment in record creation", line));
        }
        let ordered: Vec<TranslatedExpr> =
            record_fields.iter().map(|f| by_name.remove(&f.name).expect("checked above")).collect();
        let expr = builders::record_expression(&mut self.factory, ordered);
        Ok(TypedExpr::new(expr, record_type))
    }

    fn translate_assign(
        &mut self,
        level: &Level,
        var: &ast::Variable,
        exp: &ast::Expr,
        line: Line,
    ) -> CompileResult<TypedExpr> {
        if let ast::Variable::Simple { name, line: var_line } = var {
            match self.value_env.find(name) {
                None => return Err(err(format!("Trying to assign a value to undefined variable {name}"), *var_line)),
                Some(EnvironmentEntry::Variable(v)) if !v.is_editable => {
                    return Err(err(format!("For loop variable {name} is not assignable"), *var_line))
                }
                _ => {}
            }
        }
        let trans_var = self.translate_variable(level, var)?;
        let trans_exp = self.translate_expression(level, exp)?;
        if !are_types_equal(&trans_var.ty, &trans_exp.ty) {
            return Err(err("Trying to assign a value to a variable of a different type", line));
        }
        let expr = builders::assignment_expression(&mut self.factory, trans_var.expr, trans_exp.expr);
        Ok(TypedExpr::new(expr, Type::Void))
    }

    fn translate_if(
        &mut self,
        level: &Level,
        test: &ast::Expr,
        then_branch: &ast::Expr,
        else_branch: Option<&ast::Expr>,
        line: Line,
    ) -> CompileResult<TypedExpr> {
        let trans_test = self.translate_expression(level, test)?;
        if !matches!(trans_test.ty, Type::Int) {
            return Err(err("The condition of an If expression must be an Integer", test.line()));
        }
        let trans_then = self.translate_expression(level, then_branch)?;
        let (else_expr, result_type) = match else_branch {
            None => {
                if !matches!(trans_then.ty, Type::Void) {
                    return Err(err(
                        "Then branch of an If expression must produce no value when there is no Else branch",
                        then_branch.line(),
                    ));
                }
                let expr = builders::if_expression(&mut self.factory, trans_test.expr, trans_then.expr, None);
                return Ok(TypedExpr::new(expr, Type::Void));
            }
            Some(else_branch) => {
                let trans_else = self.translate_expression(level, else_branch)?;
                if !are_types_equal(&trans_then.ty, &trans_else.ty) {
                    return Err(err(
                        "Then and Else branches of an If expression must return values of the same type",
                        line,
                    ));
                }
                let result_type =
                    if matches!(trans_then.ty, Type::Nil) { trans_else.ty.clone() } else { trans_then.ty.clone() };
                (Some(trans_else.expr), result_type)
            }
        };
        let expr = builders::if_expression(&mut self.factory, trans_test.expr, trans_then.expr, else_expr);
        Ok(TypedExpr::new(expr, result_type))
    }

    fn translate_while(
        &mut self,
        level: &Level,
        test: &ast::Expr,
        body: &ast::Expr,
        line: Line,
    ) -> CompileResult<TypedExpr> {
        let trans_test = self.translate_expression(level, test)?;
        if !matches!(trans_test.ty, Type::Int) {
            return Err(err("The condition of a While expression must be an Integer", line));
        }
        let break_label = self.factory.new_label();
        self.break_labels.push(break_label.clone());
        self.value_env.begin_scope(true);
        self.type_env.begin_scope(true);
        let trans_body = self.translate_expression(level, body);
        self.value_env.end_scope();
        self.type_env.end_scope();
        self.break_labels.pop();
        let trans_body = trans_body?;
        if !matches!(trans_body.ty, Type::Void) {
            return Err(err("While body must produce no value", body.line()));
        }
        let expr = builders::while_expression(&mut self.factory, trans_test.expr, trans_body.expr, break_label);
        Ok(TypedExpr::new(expr, Type::Void))
    }

    fn translate_for(
        &mut self,
        level: &Level,
        var: &str,
        lo: &ast::Expr,
        hi: &ast::Expr,
        body: &ast::Expr,
        line: Line,
    ) -> CompileResult<TypedExpr> {
        let trans_lo = self.translate_expression(level, lo)?;
        if !matches!(trans_lo.ty, Type::Int) {
            return Err(err("Starting value for loop variable in a For expression must be an Integer", lo.line()));
        }
        let trans_hi = self.translate_expression(level, hi)?;
        if !matches!(trans_hi.ty, Type::Int) {
            return Err(err("Ending value for loop variable in a For expression must be an Integer", hi.line()));
        }
        let break_label = self.factory.new_label();
        self.break_labels.push(break_label.clone());
        self.value_env.begin_scope(true);
        self.type_env.begin_scope(true);
        let access = level.alloc_local(&mut self.factory, true);
        self.value_env.add(
            var,
            EnvironmentEntry::Variable(VariableEntry {
                ty: Type::Int,
                access: access.clone(),
                level: level.clone(),
                is_editable: false,
            }),
        );
        let var_expr = builders::simple_variable(&self.map, &access, level);
        let trans_body = self.translate_expression(level, body);
        self.value_env.end_scope();
        self.type_env.end_scope();
        self.break_labels.pop();
        let trans_body = trans_body?;
        if !matches!(trans_body.ty, Type::Void) {
            return Err(err("For body must produce no value", body.line()));
        }
        let _ = line;
        let expr = builders::for_expression(
            &mut self.factory,
            var_expr,
            trans_lo.expr,
            trans_hi.expr,
            trans_body.expr,
            break_label,
        );
        Ok(TypedExpr::new(expr, Type::Void))
    }

    fn translate_let(
        &mut self,
        level: &Level,
        decs: &[ast::Declaration],
        body: &[ast::Expr],
        line: Line,
    ) -> CompileResult<TypedExpr> {
        self.value_env.begin_scope(false);
        self.type_env.begin_scope(false);
        let mut translated_decs = Vec::new();
        let mut failure = None;
        for dec in decs {
            match self.translate_declaration(level, dec) {
                Ok(ds) => translated_decs.extend(ds),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        let result = if let Some(e) = failure {
            Err(e)
        } else {
            let mut last_type = Type::Void;
            let mut translated_body = Vec::with_capacity(body.len());
            let mut body_failure = None;
            for e in body {
                match self.translate_expression(level, e) {
                    Ok(t) => {
                        last_type = t.ty.clone();
                        translated_body.push(t.expr);
                    }
                    Err(cause) => {
                        body_failure = Some(cause);
                        break;
                    }
                }
            }
            match body_failure {
                Some(e) => Err(e),
                None => {
                    let body_expr = builders::sequence_expression(&mut self.factory, translated_body);
                    let expr = builders::let_expression(&mut self.factory, translated_decs, body_expr);
                    Ok(TypedExpr::new(expr, last_type))
                }
            }
        };
        self.value_env.end_scope();
        self.type_env.end_scope();
        let _ = line;
        result
    }

    fn translate_array(
        &mut self,
        level: &Level,
        type_name: &str,
        size: &ast::Expr,
        init: &ast::Expr,
        line: Line,
    ) -> CompileResult<TypedExpr> {
        let array_type = self.type_env.find(type_name).cloned();
        let array_type = match array_type {
            Some(t) => t,
            None => return Err(err(format!("Undefined array type {type_name}"), line)),
        };
        let element_type = match &array_type {
            Type::Array(data) => data.element.borrow().clone(),
            _ => {
                return Err(err(
                    format!("Trying to create an array of type {type_name}, which is not an array type"),
                    line,
                ))
            }
        };
        let trans_size = self.translate_expression(level, size)?;
        if !matches!(trans_size.ty, Type::Int) {
            return Err(err("Array size must be an Integer", size.line()));
        }
        let trans_init = self.translate_expression(level, init)?;
        if !are_types_equal(&element_type, &trans_init.ty) {
            return Err(err("Array initial value must be of its declared type", init.line()));
        }
        let expr = builders::array_expression(&mut self.factory, trans_size.expr, trans_init.expr);
        Ok(TypedExpr::new(expr, array_type))
    }

    fn translate_declaration(
        &mut self,
        level: &Level,
        declaration: &ast::Declaration,
    ) -> CompileResult<Vec<TranslatedExpr>> {
        match declaration {
            ast::Declaration::Functions(function_decs, line) => {
                self.translate_function_decs(level, function_decs, *line)?;
                Ok(Vec::new())
            }
            ast::Declaration::Variable(var_dec) => Ok(vec![self.translate_variable_dec(level, var_dec)?]),
            ast::Declaration::Types(type_decs, line) => {
                self.translate_type_decs(type_decs, *line)?;
                Ok(Vec::new())
            }
        }
    }

    fn translate_function_decs(
        &mut self,
        level: &Level,
        function_decs: &[ast::FunctionDec],
        line: Line,
    ) -> CompileResult<()> {
        if !check_name_unicity(function_decs.iter().map(|f| f.name.as_str())) {
            return Err(err("All names in the function declaration block must be unique", line));
        }
        let mut entries = Vec::with_capacity(function_decs.len());
        for function_dec in function_decs {
            let mut formals = Vec::with_capacity(function_dec.params.len());
            for param in &function_dec.params {
                let param_type = self.type_env.find(&param.type_name).cloned();
                let param_type = match param_type {
                    Some(t) => t,
                    None => {
                        return Err(err(
                            format!(
                                "Undefined argument type {} for parameter {} in function {}",
                                param.type_name, param.name, function_dec.name
                            ),
                            param.line,
                        ))
                    }
                };
                formals.push(param_type);
            }
            let result_type = match &function_dec.return_type {
                None => Type::Void,
                Some(name) => match self.type_env.find(name).cloned() {
                    Some(t) => t,
                    None => {
                        return Err(err(
                            format!("Undefined return type {name} for function {}", function_dec.name),
                            function_dec.line,
                        ))
                    }
                },
            };
            let escapes = vec![true; formals.len()];
            let function_label = TempFactory::named_label(function_dec.name.clone());
            let function_level =
                Level::new_real(&mut self.factory, level.clone(), function_label.clone(), &escapes);
            let entry = FunctionEntry {
                formals,
                result: result_type,
                level: function_level.clone(),
                label: function_label,
            };
            self.value_env.add(&function_dec.name, EnvironmentEntry::Function(entry.clone()));
            entries.push((function_level, entry));
        }
        for (function_dec, (function_level, entry)) in function_decs.iter().zip(entries) {
            self.value_env.begin_scope(false);
            // formals()[0] is the static link; params start at index 1.
            let param_accesses = function_level.formals();
            for (param, (formal, formal_type)) in
                function_dec.params.iter().zip(param_accesses.into_iter().skip(1).zip(entry.formals.iter()))
            {
                self.value_env.add(
                    &param.name,
                    EnvironmentEntry::Variable(VariableEntry {
                        ty: formal_type.clone(),
                        access: formal,
                        level: function_level.clone(),
                        is_editable: true,
                    }),
                );
            }
            let translated_body = self.translate_expression(&function_level, &function_dec.body);
            self.value_env.end_scope();
            let translated_body = translated_body?;
            if !are_types_equal(&translated_body.ty, &entry.result) {
                return Err(err(
                    format!(
                        "Function {} returns a value of a type different than its declared type",
                        function_dec.name
                    ),
                    function_dec.line,
                ));
            }
            builders::proc_entry_exit(
                &mut self.factory,
                &self.map,
                &function_level,
                translated_body.expr,
                &mut self.fragments,
            );
        }
        Ok(())
    }

    fn translate_variable_dec(&mut self, level: &Level, dec: &ast::VariableDec) -> CompileResult<TranslatedExpr> {
        let trans_exp = self.translate_expression(level, &dec.init)?;
        if matches!(trans_exp.ty, Type::Nil) && dec.type_name.is_none() {
            return Err(err(
                format!("Must declare the type of variable {} when initializing it to nil", dec.name),
                dec.line,
            ));
        }
        let declared_type = match &dec.type_name {
            None => None,
            Some(name) => {
                let declared = self.type_env.find(name).cloned();
                let declared = match declared {
                    Some(t) => t,
                    None => {
                        return Err(err(
                            format!("Undefined type {name} in variable declaration for {}", dec.name),
                            dec.line,
                        ))
                    }
                };
                if matches!(trans_exp.ty, Type::Nil) && !matches!(declared, Type::Record(_)) {
                    return Err(err(
                        format!("Variable {} must be of a record type when initialized to nil", dec.name),
                        dec.line,
                    ));
                }
                if !are_types_equal(&declared, &trans_exp.ty) {
                    return Err(err(
                        format!("Initial value for variable {} is not of its declared type {name}", dec.name),
                        dec.line,
                    ));
                }
                Some(declared)
            }
        };
        let final_type = declared_type.unwrap_or_else(|| trans_exp.ty.clone());
        let access = level.alloc_local(&mut self.factory, true);
        self.value_env.add(
            &dec.name,
            EnvironmentEntry::Variable(VariableEntry {
                ty: final_type,
                access: access.clone(),
                level: level.clone(),
                is_editable: true,
            }),
        );
        let var_expr = builders::simple_variable(&self.map, &access, level);
        Ok(builders::assignment_expression(&mut self.factory, var_expr, trans_exp.expr))
    }

    fn translate_type_decs(&mut self, type_decs: &[ast::TypeDec], line: Line) -> CompileResult<()> {
        if !check_name_unicity(type_decs.iter().map(|t| t.name.as_str())) {
            return Err(err("All names in the type declaration block must be unique", line));
        }
        for type_dec in type_decs {
            self.type_env.add(&type_dec.name, Type::Name(type_dec.name.clone()));
        }
        for type_dec in type_decs {
            let translated = translate_type(&self.type_env, &type_dec.ty)?;
            self.type_env.add(&type_dec.name, translated);
        }
        for type_dec in type_decs {
            let mut seen = std::collections::HashSet::new();
            if simplify_type_aliases(&type_dec.name, &mut self.type_env, &mut seen).is_none() {
                return Err(err(format!("Cyclic type definition found involving type {}", type_dec.name), type_dec.line));
            }
        }
        for type_dec in type_decs {
            if let Some(definition) = self.type_env.find(&type_dec.name).cloned() {
                eliminate_name_types(&definition, &self.type_env);
            }
        }
        Ok(())
    }
}

fn check_name_unicity<'a>(names: impl Iterator<Item = &'a str>) -> bool {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return false;
        }
    }
    true
}

fn translate_type(type_env: &SymbolTable<Type>, ty: &ast::Type) -> CompileResult<Type> {
    match ty {
        ast::Type::Name { name, line } => type_env
            .find(name)
            .cloned()
            .ok_or_else(|| err(format!("Undefined type name {name}"), *line)),
        ast::Type::Record { fields, line } => {
            let mut field_list = Vec::with_capacity(fields.len());
            for field in fields {
                let field_type = type_env
                    .find(&field.type_name)
                    .cloned()
                    .ok_or_else(|| err(format!("Undefined record field type {}", field.type_name), field.line))?;
                field_list.push(TypeField { name: field.name.clone(), ty: field_type });
            }
            let _ = line;
            Ok(Type::record(field_list))
        }
        ast::Type::Array { element, line } => {
            let element_type =
                type_env.find(element).cloned().ok_or_else(|| err(format!("Undefined array element type {element}"), *line))?;
            Ok(Type::array(element_type))
        }
    }
}

/// Chases a chain of `Name` aliases to the record/array it ultimately
/// refers to, memoizing every alias along the way. Returns `None` on a
/// cycle. Grounded on `analyzers.py::simplify_type_aliases`.
fn simplify_type_aliases(
    type_name: &str,
    type_env: &mut SymbolTable<Type>,
    already_seen: &mut std::collections::HashSet<String>,
) -> Option<Type> {
    if already_seen.contains(type_name) {
        return None;
    }
    let definition = type_env.find(type_name).cloned()?;
    if let Type::Name(alias) = &definition {
        already_seen.insert(type_name.to_string());
        let resolved = simplify_type_aliases(alias, type_env, already_seen)?;
        type_env.add(type_name, resolved.clone());
        Some(resolved)
    } else {
        Some(definition)
    }
}

fn maybe_lookup_name_type(ty: &Type, type_env: &SymbolTable<Type>) -> Type {
    match ty {
        Type::Name(name) => type_env.find(name).cloned().unwrap_or_else(|| ty.clone()),
        other => other.clone(),
    }
}

/// Replaces any remaining `Name` references inside a record's fields or an
/// array's element type with their resolved referent. Grounded on
/// `analyzers.py::eliminate_name_types`.
fn eliminate_name_types(ty: &Type, type_env: &SymbolTable<Type>) {
    match ty {
        Type::Array(data) => {
            let resolved = maybe_lookup_name_type(&data.element.borrow(), type_env);
            *data.element.borrow_mut() = resolved;
        }
        Type::Record(data) => {
            let resolved: Vec<TypeField> = data
                .fields
                .borrow()
                .iter()
                .map(|f| TypeField { name: f.name.clone(), ty: maybe_lookup_name_type(&f.ty, type_env) })
                .collect();
            *data.fields.borrow_mut() = resolved;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::all_registers;
    use crate::translate::level::base_program_level;
    use crate::translate::types::Field as RecordField;

    fn translator() -> Translator {
        let mut factory = TempFactory::new();
        let map = TempMap::initialize(&mut factory, &all_registers());
        Translator::new(factory, map)
    }

    const LINE: Line = 1;

    #[test]
    fn integer_literal_has_int_type() {
        let mut t = translator();
        let level = base_program_level(&mut t.factory);
        let result = t.translate_expression(&level, &ast::Expr::Int(42, LINE)).unwrap();
        assert!(matches!(result.ty, Type::Int));
    }

    #[test]
    fn undefined_variable_is_a_semantic_error() {
        let mut t = translator();
        let level = base_program_level(&mut t.factory);
        let var = ast::Variable::Simple { name: "x".to_string(), line: LINE };
        let failure = t.translate_expression(&level, &ast::Expr::Var(Box::new(var))).unwrap_err();
        assert_eq!(failure.line(), LINE);
    }

    #[test]
    fn let_binds_a_variable_usable_in_its_body() {
        let mut t = translator();
        let level = base_program_level(&mut t.factory);
        let dec = ast::Declaration::Variable(ast::VariableDec {
            name: "x".to_string(),
            type_name: None,
            init: ast::Expr::Int(1, LINE),
            line: LINE,
        });
        let body = vec![ast::Expr::Var(Box::new(ast::Variable::Simple { name: "x".to_string(), line: LINE }))];
        let let_exp = ast::Expr::Let { decs: vec![dec], body, line: LINE };
        let result = t.translate_expression(&level, &let_exp).unwrap();
        assert!(matches!(result.ty, Type::Int));
    }

    #[test]
    fn break_outside_a_loop_is_rejected() {
        let mut t = translator();
        let level = base_program_level(&mut t.factory);
        let failure = t.translate_expression(&level, &ast::Expr::Break(LINE)).unwrap_err();
        assert_eq!(failure.line(), LINE);
    }

    #[test]
    fn break_inside_a_while_loop_is_accepted() {
        let mut t = translator();
        let level = base_program_level(&mut t.factory);
        let while_exp = ast::Expr::While {
            test: Box::new(ast::Expr::Int(1, LINE)),
            body: Box::new(ast::Expr::Break(LINE)),
            line: LINE,
        };
        assert!(t.translate_expression(&level, &while_exp).is_ok());
    }

    #[test]
    fn while_body_must_produce_no_value() {
        let mut t = translator();
        let level = base_program_level(&mut t.factory);
        let while_exp = ast::Expr::While {
            test: Box::new(ast::Expr::Int(1, LINE)),
            body: Box::new(ast::Expr::Int(1, LINE)),
            line: LINE,
        };
        assert!(t.translate_expression(&level, &while_exp).is_err());
    }

    #[test]
    fn record_creation_checks_every_field_is_assigned() {
        let mut t = translator();
        let level = base_program_level(&mut t.factory);
        t.type_env.add(
            "point",
            Type::record(vec![
                RecordField { name: "x".into(), ty: Type::Int },
                RecordField { name: "y".into(), ty: Type::Int },
            ]),
        );
        let rec = ast::Expr::Record {
            type_name: "point".to_string(),
            fields: vec![ast::ExpField { name: "x".to_string(), exp: ast::Expr::Int(1, LINE), line: LINE }],
            line: LINE,
        };
        assert!(t.translate_expression(&level, &rec).is_err());
    }

    #[test]
    fn nil_is_a_legal_initializer_for_a_declared_record_variable() {
        let mut t = translator();
        let level = base_program_level(&mut t.factory);
        t.type_env.add("point", Type::record(vec![RecordField { name: "x".into(), ty: Type::Int }]));
        let dec = ast::Declaration::Variable(ast::VariableDec {
            name: "p".to_string(),
            type_name: Some("point".to_string()),
            init: ast::Expr::Nil(LINE),
            line: LINE,
        });
        let let_exp = ast::Expr::Let { decs: vec![dec], body: vec![ast::Expr::Empty(LINE)], line: LINE };
        assert!(t.translate_expression(&level, &let_exp).is_ok());
    }

    #[test]
    fn mismatched_arithmetic_operand_type_is_rejected() {
        let mut t = translator();
        let level = base_program_level(&mut t.factory);
        let op = ast::Expr::Op {
            oper: ast::Oper::Plus,
            left: Box::new(ast::Expr::Int(1, LINE)),
            right: Box::new(ast::Expr::Str("x".to_string(), LINE)),
            line: LINE,
        };
        assert!(t.translate_expression(&level, &op).is_err());
    }

    #[test]
    fn calling_an_undeclared_function_is_rejected() {
        let mut t = translator();
        let level = base_program_level(&mut t.factory);
        let call = ast::Expr::Call { func: "mystery".to_string(), args: vec![], line: LINE };
        assert!(t.translate_expression(&level, &call).is_err());
    }

    #[test]
    fn calling_print_with_the_wrong_argument_count_is_rejected() {
        let mut t = translator();
        let level = base_program_level(&mut t.factory);
        let call = ast::Expr::Call { func: "print".to_string(), args: vec![], line: LINE };
        assert!(t.translate_expression(&level, &call).is_err());
    }
}
