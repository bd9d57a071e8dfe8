//! Fields, methods, constructors, and parameters

use crate::error::{CodeError, CodeResult};
use crate::expression::Expression;
use crate::model::CodeModel;
use crate::node::{
    FieldData, NodeId, NodeKind, OperationData, OperationKind, ParameterData, SourceOrigin,
};
use crate::reflect::ReflectiveObject;
use crate::statement::Statement;

impl CodeModel {
    pub(crate) fn field_data(&self, id: NodeId) -> CodeResult<&FieldData> {
        match &self.node(id).kind {
            NodeKind::Field(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "field")),
        }
    }

    fn field_data_mut(&mut self, id: NodeId) -> CodeResult<&mut FieldData> {
        match &mut self.node_mut(id).kind {
            NodeKind::Field(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "field")),
        }
    }

    pub(crate) fn operation_data(&self, id: NodeId) -> CodeResult<&OperationData> {
        match &self.node(id).kind {
            NodeKind::Operation(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "operation")),
        }
    }

    fn operation_data_mut(&mut self, id: NodeId) -> CodeResult<&mut OperationData> {
        match &mut self.node_mut(id).kind {
            NodeKind::Operation(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "operation")),
        }
    }

    pub(crate) fn parameter_data(&self, id: NodeId) -> CodeResult<&ParameterData> {
        match &self.node(id).kind {
            NodeKind::Parameter(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "parameter")),
        }
    }

    fn parameter_data_mut(&mut self, id: NodeId) -> CodeResult<&mut ParameterData> {
        match &mut self.node_mut(id).kind {
            NodeKind::Parameter(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "parameter")),
        }
    }

    /// Drop the cached properties of a type
    pub(crate) fn invalidate_properties(&mut self, ty: NodeId) {
        if let NodeKind::Type(data) = &mut self.node_mut(ty).kind {
            data.properties = None;
        }
    }

    /// Declared fields of a type
    pub fn fields(&mut self, ty: NodeId) -> CodeResult<Vec<NodeId>> {
        self.initialize(ty)?;
        Ok(self.type_data(ty)?.fields.clone())
    }

    /// Declared field by name
    pub fn field(&mut self, ty: NodeId, name: &str) -> CodeResult<Option<NodeId>> {
        let fields = self.fields(ty)?;
        Ok(fields.into_iter().find(|f| self.simple_name(*f) == name))
    }

    /// Declare a new field
    pub fn add_field(&mut self, ty: NodeId, name: &str) -> CodeResult<NodeId> {
        self.initialize(ty)?;
        self.verify_mutable(ty)?;
        if self.field(ty, name)?.is_some() {
            return Err(CodeError::DuplicateMember {
                name: name.to_string(),
            });
        }
        let field = self.alloc(
            Some(ty),
            NodeKind::Field(FieldData {
                name: name.to_string(),
                ..FieldData::default()
            }),
        );
        self.node_mut(field).initialized = true;
        self.type_data_mut(ty)?.fields.push(field);
        self.invalidate_properties(ty);
        Ok(field)
    }

    /// Declared type of a field
    pub fn field_type(&mut self, field: NodeId) -> CodeResult<Option<NodeId>> {
        self.initialize(field)?;
        Ok(self.field_data(field)?.ty)
    }

    /// Change the declared type of a field
    pub fn set_field_type(&mut self, field: NodeId, ty: NodeId) -> CodeResult<()> {
        self.initialize(field)?;
        self.verify_mutable(field)?;
        self.field_data_mut(field)?.ty = Some(ty);
        if let Some(owner) = self.declaring_type(field) {
            self.invalidate_properties(owner);
        }
        Ok(())
    }

    /// Initializer of a field
    pub fn initializer(&mut self, field: NodeId) -> CodeResult<Option<Expression>> {
        self.initialize(field)?;
        Ok(self.field_data(field)?.initializer.clone())
    }

    /// Replace the initializer of a field
    pub fn set_initializer(&mut self, field: NodeId, initializer: Option<Expression>) -> CodeResult<()> {
        self.initialize(field)?;
        self.verify_mutable(field)?;
        self.field_data_mut(field)?.initializer = initializer;
        Ok(())
    }

    /// Declared methods of a type
    pub fn methods(&mut self, ty: NodeId) -> CodeResult<Vec<NodeId>> {
        self.initialize(ty)?;
        Ok(self.type_data(ty)?.methods.clone())
    }

    /// First declared method with the given name
    pub fn method(&mut self, ty: NodeId, name: &str) -> CodeResult<Option<NodeId>> {
        let methods = self.methods(ty)?;
        Ok(methods.into_iter().find(|m| self.simple_name(*m) == name))
    }

    /// Declared method by erased signature (`name(type,type)`)
    pub fn method_by_signature(&mut self, ty: NodeId, signature: &str) -> CodeResult<Option<NodeId>> {
        for method in self.methods(ty)? {
            if self.signature(method)? == signature {
                return Ok(Some(method));
            }
        }
        Ok(None)
    }

    /// Declared constructors of a type
    pub fn constructors(&mut self, ty: NodeId) -> CodeResult<Vec<NodeId>> {
        self.initialize(ty)?;
        Ok(self.type_data(ty)?.constructors.clone())
    }

    fn new_operation(
        &mut self,
        ty: NodeId,
        kind: OperationKind,
        name: String,
        check_duplicate: bool,
    ) -> CodeResult<NodeId> {
        self.initialize(ty)?;
        self.verify_mutable(ty)?;
        let signature = format!("{}()", name);
        if check_duplicate && self.operation_by_signature(ty, kind, &signature)?.is_some() {
            return Err(CodeError::DuplicateMember { name: signature });
        }
        let mut data = OperationData::new(kind, name);
        data.body = Some(Vec::new());
        if kind == OperationKind::Method {
            data.returns = self.primitive("void");
        }
        let operation = self.alloc(Some(ty), NodeKind::Operation(data));
        self.node_mut(operation).initialized = true;
        let type_data = self.type_data_mut(ty)?;
        match kind {
            OperationKind::Method => type_data.methods.push(operation),
            OperationKind::Constructor => type_data.constructors.push(operation),
        }
        self.invalidate_properties(ty);
        Ok(operation)
    }

    /// Declared method or constructor by erased signature
    pub fn operation_by_signature(
        &mut self,
        ty: NodeId,
        kind: OperationKind,
        signature: &str,
    ) -> CodeResult<Option<NodeId>> {
        let candidates = match kind {
            OperationKind::Method => self.methods(ty)?,
            OperationKind::Constructor => self.constructors(ty)?,
        };
        for candidate in candidates {
            if self.signature(candidate)? == signature {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Declare an operation without the duplicate check of
    /// [`add_method`](Self::add_method)
    ///
    /// Overloads only differ once their parameters are added, so callers
    /// building `run(int)` next to `run()` declare first and compare
    /// signatures afterwards.
    pub fn declare_operation(&mut self, ty: NodeId, kind: OperationKind, name: &str) -> CodeResult<NodeId> {
        let name = match kind {
            OperationKind::Method => name.to_string(),
            OperationKind::Constructor => self.simple_name(ty),
        };
        self.new_operation(ty, kind, name, false)
    }

    /// Declare a new `void` method without parameters
    pub fn add_method(&mut self, ty: NodeId, name: &str) -> CodeResult<NodeId> {
        self.new_operation(ty, OperationKind::Method, name.to_string(), true)
    }

    /// Declare a new constructor without parameters
    pub fn add_constructor(&mut self, ty: NodeId) -> CodeResult<NodeId> {
        let name = self.simple_name(ty);
        self.new_operation(ty, OperationKind::Constructor, name, true)
    }

    /// Method or constructor
    pub fn operation_kind(&self, operation: NodeId) -> CodeResult<OperationKind> {
        Ok(self.operation_data(operation)?.kind)
    }

    /// Parameters of an operation
    pub fn parameters(&mut self, operation: NodeId) -> CodeResult<Vec<NodeId>> {
        self.initialize(operation)?;
        Ok(self.operation_data(operation)?.parameters.clone())
    }

    /// Append a parameter
    pub fn add_parameter(&mut self, operation: NodeId, name: &str, ty: NodeId) -> CodeResult<NodeId> {
        self.initialize(operation)?;
        self.verify_mutable(operation)?;
        let parameter = self.alloc(
            Some(operation),
            NodeKind::Parameter(ParameterData {
                name: name.to_string(),
                ty: Some(ty),
                ..ParameterData::default()
            }),
        );
        self.node_mut(parameter).initialized = true;
        self.operation_data_mut(operation)?.parameters.push(parameter);
        if let Some(owner) = self.declaring_type(operation) {
            self.invalidate_properties(owner);
        }
        Ok(parameter)
    }

    /// Declared type of a parameter
    pub fn parameter_type(&self, parameter: NodeId) -> CodeResult<Option<NodeId>> {
        Ok(self.parameter_data(parameter)?.ty)
    }

    /// Change the declared type of a parameter
    pub fn set_parameter_type(&mut self, parameter: NodeId, ty: NodeId) -> CodeResult<()> {
        self.verify_mutable(parameter)?;
        self.parameter_data_mut(parameter)?.ty = Some(ty);
        self.invalidate_parameter_owner(parameter);
        Ok(())
    }

    /// Mark a parameter as variable arity or `final`
    pub fn set_parameter_flags(&mut self, parameter: NodeId, varargs: bool, is_final: bool) -> CodeResult<()> {
        self.verify_mutable(parameter)?;
        let data = self.parameter_data_mut(parameter)?;
        data.varargs = varargs;
        data.is_final = is_final;
        self.invalidate_parameter_owner(parameter);
        Ok(())
    }

    fn invalidate_parameter_owner(&mut self, parameter: NodeId) {
        let owner = self.node(parameter).parent.and_then(|op| self.declaring_type(op));
        if let Some(owner) = owner {
            self.invalidate_properties(owner);
        }
    }

    /// Check whether a parameter has variable arity
    pub fn is_varargs(&self, parameter: NodeId) -> CodeResult<bool> {
        Ok(self.parameter_data(parameter)?.varargs)
    }

    /// Return type of an operation, `None` for constructors
    pub fn returns(&mut self, operation: NodeId) -> CodeResult<Option<NodeId>> {
        self.initialize(operation)?;
        Ok(self.operation_data(operation)?.returns)
    }

    /// Change the return type of a method
    pub fn set_return_type(&mut self, operation: NodeId, ty: NodeId) -> CodeResult<()> {
        self.initialize(operation)?;
        self.verify_mutable(operation)?;
        let data = self.operation_data_mut(operation)?;
        if data.kind == OperationKind::Constructor {
            return Err(CodeError::kind_mismatch(operation, "method"));
        }
        data.returns = Some(ty);
        if let Some(owner) = self.declaring_type(operation) {
            self.invalidate_properties(owner);
        }
        Ok(())
    }

    /// Declared exceptions of an operation
    pub fn exceptions(&mut self, operation: NodeId) -> CodeResult<Vec<NodeId>> {
        self.initialize(operation)?;
        Ok(self.operation_data(operation)?.exceptions.clone())
    }

    /// Declare an exception
    pub fn add_exception(&mut self, operation: NodeId, exception: NodeId) -> CodeResult<()> {
        self.initialize(operation)?;
        self.verify_mutable(operation)?;
        self.operation_data_mut(operation)?.exceptions.push(exception);
        Ok(())
    }

    /// Body of an operation, `None` for abstract operations
    pub fn body(&mut self, operation: NodeId) -> CodeResult<Option<Vec<Statement>>> {
        self.initialize(operation)?;
        Ok(self.operation_data(operation)?.body.clone())
    }

    /// Replace the body of an operation
    pub fn set_body(&mut self, operation: NodeId, body: Option<Vec<Statement>>) -> CodeResult<()> {
        self.initialize(operation)?;
        self.verify_mutable(operation)?;
        self.operation_data_mut(operation)?.body = body;
        Ok(())
    }

    /// Append a statement to the body of an operation
    pub fn add_statement(&mut self, operation: NodeId, statement: Statement) -> CodeResult<()> {
        self.initialize(operation)?;
        self.verify_mutable(operation)?;
        self.operation_data_mut(operation)?
            .body
            .get_or_insert_with(Vec::new)
            .push(statement);
        Ok(())
    }

    /// Add a field, operation, or nested type to a type
    ///
    /// A member owned by another node is deep-copied into `ty`; the copy is
    /// returned. A member already owned by `ty` is returned unchanged.
    pub fn add_member(&mut self, ty: NodeId, member: NodeId) -> CodeResult<NodeId> {
        self.initialize(ty)?;
        self.verify_mutable(ty)?;
        if self.node(member).parent == Some(ty) && self.children(ty).contains(&member) {
            return Ok(member);
        }
        let duplicate = match &self.node(member).kind {
            NodeKind::Field(data) => {
                let name = data.name.clone();
                self.field(ty, &name)?.map(|_| name)
            }
            NodeKind::Type(data) => {
                let name = data.simple_name.clone();
                self.nested_type(ty, &name)?.map(|_| name)
            }
            NodeKind::Operation(data) => {
                let kind = data.kind;
                let signature = self.signature(member)?;
                let existing = match kind {
                    OperationKind::Method => self.methods(ty)?,
                    OperationKind::Constructor => self.constructors(ty)?,
                };
                let mut found = None;
                for operation in existing {
                    if self.signature(operation)? == signature {
                        found = Some(signature.clone());
                    }
                }
                found
            }
            _ => return Err(CodeError::kind_mismatch(member, "member")),
        };
        if let Some(name) = duplicate {
            return Err(CodeError::DuplicateMember { name });
        }
        self.copy(member, ty)
    }

    /// Remove a field, operation, or nested type from a type
    pub fn remove_member(&mut self, ty: NodeId, member: NodeId) -> CodeResult<bool> {
        self.initialize(ty)?;
        self.verify_mutable(ty)?;
        let data = self.type_data_mut(ty)?;
        let before = data.fields.len() + data.methods.len() + data.constructors.len() + data.nested_types.len();
        data.fields.retain(|m| *m != member);
        data.methods.retain(|m| *m != member);
        data.constructors.retain(|m| *m != member);
        data.nested_types.retain(|m| *m != member);
        let after = data.fields.len() + data.methods.len() + data.constructors.len() + data.nested_types.len();
        self.invalidate_properties(ty);
        Ok(after < before)
    }

    /// Rename a field, operation, or parameter
    ///
    /// Fails with [`CodeError::DuplicateMember`] when the declaring type
    /// already has a field of that name or a method of the resulting
    /// signature.
    pub fn rename(&mut self, id: NodeId, name: &str) -> CodeResult<()> {
        self.initialize(id)?;
        self.verify_mutable(id)?;
        if let Some(clash) = self.rename_clash(id, name)? {
            return Err(CodeError::DuplicateMember { name: clash });
        }
        match &mut self.node_mut(id).kind {
            NodeKind::Field(data) => data.name = name.to_string(),
            NodeKind::Operation(data) if data.kind == OperationKind::Method => {
                data.name = name.to_string()
            }
            NodeKind::Parameter(data) => data.name = name.to_string(),
            _ => return Err(CodeError::kind_mismatch(id, "field, method, or parameter")),
        }
        if matches!(self.node(id).kind, NodeKind::Parameter(_)) {
            self.invalidate_parameter_owner(id);
        } else if let Some(owner) = self.declaring_type(id) {
            self.invalidate_properties(owner);
        }
        Ok(())
    }

    /// Name or signature another member of the declaring type already uses
    fn rename_clash(&mut self, id: NodeId, name: &str) -> CodeResult<Option<String>> {
        let Some(owner) = self.declaring_type(id) else {
            return Ok(None);
        };
        let (is_field, is_method) = match &self.node(id).kind {
            NodeKind::Field(_) => (true, false),
            NodeKind::Operation(data) => (false, data.kind == OperationKind::Method),
            _ => (false, false),
        };
        if is_field {
            let existing = self.field(owner, name)?;
            return Ok(existing.filter(|existing| *existing != id).map(|_| name.to_string()));
        }
        if !is_method {
            return Ok(None);
        }
        let old = self.signature(id)?;
        let arguments = old.find('(').map_or("()", |start| &old[start..]);
        let renamed = format!("{}{}", name, arguments);
        let existing = self.operation_by_signature(owner, OperationKind::Method, &renamed)?;
        Ok(existing.filter(|existing| *existing != id).map(|_| renamed))
    }

    /// Erased signature of an operation (`name(type,type)`)
    pub fn signature(&mut self, operation: NodeId) -> CodeResult<String> {
        self.initialize(operation)?;
        self.operation_data(operation)?;
        Ok(self.declared_signature(operation))
    }

    /// The method of a super type that `method` overrides
    ///
    /// Super types are searched in [`super_type_walk`](Self::super_type_walk)
    /// order. A candidate matches on name and on the erasure of its
    /// parameter types resolved against the declaring type of `method`.
    pub fn parent_method(&mut self, method: NodeId) -> CodeResult<Option<NodeId>> {
        if self.operation_kind(method)? != OperationKind::Method {
            return Ok(None);
        }
        let Some(declaring) = self.declaring_type(method) else {
            return Ok(None);
        };
        let name = self.simple_name(method);
        let own: Vec<String> = self
            .parameters(method)?
            .iter()
            .map(|p| self.erasure(*p))
            .collect();

        for super_type in self.super_type_walk(declaring)? {
            'candidates: for candidate in self.methods(super_type)? {
                if self.simple_name(candidate) != name {
                    continue;
                }
                let parameters = self.parameters(candidate)?;
                if parameters.len() != own.len() {
                    continue;
                }
                for (parameter, expected) in parameters.iter().zip(&own) {
                    let data = self.parameter_data(*parameter)?.clone();
                    let erased = match data.ty {
                        Some(ty) => {
                            let resolved = self.resolve(ty, declaring)?;
                            self.erasure(resolved)
                        }
                        None => crate::ROOT_TYPE.to_string(),
                    };
                    let erased = if data.varargs && !erased.ends_with("[]") {
                        format!("{}[]", erased)
                    } else {
                        erased
                    };
                    if &erased != expected {
                        continue 'candidates;
                    }
                }
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    pub(crate) fn initialize_field(&mut self, id: NodeId) -> CodeResult<()> {
        if let Some(ReflectiveObject::Field(descriptor)) = self.node(id).reflective.clone() {
            let scope = self.node(id).parent.unwrap_or(id);
            let ty = self.type_from_ref(scope, id, &descriptor.ty)?;
            self.field_data_mut(id)?.ty = Some(ty);
            self.add_reflective_annotations(id, &descriptor.annotations)?;
        }
        if let SourceOrigin::Resolved(source) = self.node(id).source.clone() {
            self.initialize(source)?;
            let shadow = self.field_data(source)?.clone();
            if self.field_data(id)?.initializer.is_none() {
                self.field_data_mut(id)?.initializer = shadow.initializer.map(|e| e.detached());
            }
            self.merge_source_extras(id, source)?;
        }
        Ok(())
    }

    pub(crate) fn initialize_operation(&mut self, id: NodeId) -> CodeResult<()> {
        if let Some(ReflectiveObject::Method(descriptor)) = self.node(id).reflective.clone() {
            self.declare_reflective_variables(id, &descriptor.type_parameters)?;

            let mut parameters = Vec::with_capacity(descriptor.parameters.len());
            for (index, parameter) in descriptor.parameters.iter().enumerate() {
                let name = parameter
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("arg{}", index));
                let node = self.alloc(
                    Some(id),
                    NodeKind::Parameter(ParameterData {
                        name,
                        varargs: parameter.varargs,
                        ..ParameterData::default()
                    }),
                );
                self.node_mut(node).reflective = Some(ReflectiveObject::Parameter(parameter.clone()));
                let ty = self.type_from_ref(id, node, &parameter.ty)?;
                self.parameter_data_mut(node)?.ty = Some(ty);
                self.add_reflective_annotations(node, &parameter.annotations)?;
                self.node_mut(node).initialized = true;
                parameters.push(node);
            }

            let kind = self.operation_data(id)?.kind;
            let returns = match (&descriptor.returns, kind) {
                (_, OperationKind::Constructor) => None,
                (Some(reference), OperationKind::Method) => Some(self.type_from_ref(id, id, reference)?),
                (None, OperationKind::Method) => self.primitive("void"),
            };
            let mut exceptions = Vec::with_capacity(descriptor.exceptions.len());
            for reference in &descriptor.exceptions {
                exceptions.push(self.type_from_ref(id, id, reference)?);
            }
            let is_abstract = descriptor.modifiers.is_abstract()
                || descriptor.modifiers.has(crate::modifiers::Modifier::Native);
            let data = self.operation_data_mut(id)?;
            data.parameters = parameters;
            data.returns = returns;
            data.exceptions = exceptions;
            if is_abstract {
                data.body = None;
            }
            self.add_reflective_annotations(id, &descriptor.annotations)?;
        }

        if let SourceOrigin::Resolved(source) = self.node(id).source.clone() {
            self.initialize(source)?;
            let shadow = self.operation_data(source)?.clone();
            let own = self.operation_data(id)?.parameters.clone();
            if own.len() == shadow.parameters.len() {
                for (parameter, shadow_parameter) in own.iter().zip(&shadow.parameters) {
                    let shadow_data = self.parameter_data(*shadow_parameter)?.clone();
                    let data = self.parameter_data_mut(*parameter)?;
                    data.name = shadow_data.name;
                    data.is_final = shadow_data.is_final;
                    self.merge_source_annotations(*parameter, *shadow_parameter)?;
                }
            } else {
                self.report(crate::diagnostics::Diagnostic::debug(
                    crate::diagnostics::DiagnosticCode::UnknownSyntax,
                    format!(
                        "Parameter count of {} differs from its source",
                        self.path_string(id)
                    ),
                ));
            }
            if self.operation_data(id)?.body.as_ref().map_or(true, Vec::is_empty) {
                if let Some(mut body) = shadow.body {
                    // Field references get their own resolution cache
                    for statement in &mut body {
                        statement.remap(&|node| node);
                    }
                    self.operation_data_mut(id)?.body = Some(body);
                }
            }
            self.merge_source_extras(id, source)?;
        }
        Ok(())
    }
}
