//! Lowering of parse results into the declaration arena
//!
//! Flattens each file's declaration trees, stamps every type reference with
//! a fresh `SiteId`, records the declaring node on each member and carries
//! the file's module and imports down to every declaration.

use serde::Serialize;
use tracing::debug;

use crate::aliases::AliasEntry;
use crate::arena::{DeclArena, DeclId, DeclNode, Relations};
use crate::ast::{
    Alias, DeclKind, Declaration, Method, MethodParameter, ParseResult, SiteId, Subscript, TypeRef,
    Variable,
};

/// Free function together with the context of its file
#[derive(Debug, Clone, Serialize)]
pub struct FunctionEntry {
    pub method: Method,
    pub module: Option<String>,
    pub file: String,
    pub imports: Vec<String>,
}

/// Output of lowering
#[derive(Debug, Default)]
pub struct Lowered {
    pub arena: DeclArena,
    pub aliases: Vec<AliasEntry>,
    pub functions: Vec<FunctionEntry>,
}

/// Context shared by every declaration of one file
struct FileContext<'a> {
    file: &'a str,
    imports: &'a [String],
}

#[derive(Default)]
struct Lowering {
    lowered: Lowered,
    next_site: u32,
}

/// Lower all parse results, in input order
pub fn lower(results: Vec<ParseResult>) -> Lowered {
    let mut lowering = Lowering::default();
    for result in results {
        lowering.lower_file(result);
    }
    let lowered = lowering.lowered;
    debug!(
        "Lowered {} declarations, {} aliases, {} functions",
        lowered.arena.len(),
        lowered.aliases.len(),
        lowered.functions.len()
    );
    lowered
}

impl Lowering {
    fn next_site(&mut self) -> SiteId {
        self.next_site += 1;
        SiteId(self.next_site)
    }

    fn stamp(&mut self, ty: &mut TypeRef) {
        let mut next = self.next_site;
        ty.walk_mut(&mut |t| {
            next += 1;
            t.site = SiteId(next);
        });
        self.next_site = next;
    }

    fn stamp_parameters(&mut self, parameters: &mut [MethodParameter]) {
        for parameter in parameters {
            self.stamp(&mut parameter.type_ref);
        }
    }

    fn stamp_method(&mut self, method: &mut Method, owner: Option<DeclId>) {
        self.stamp_parameters(&mut method.parameters);
        match &mut method.return_type {
            Some(ty) => self.stamp(ty),
            // every method gets a return site so initializers can record theirs
            None => {
                let mut ty = TypeRef::named("Void");
                ty.site = self.next_site();
                method.return_type = Some(ty);
            }
        }
        method.defined_in = owner;
    }

    fn stamp_kind(&mut self, kind: &mut DeclKind) {
        match kind {
            DeclKind::Enum(body) => {
                for case in &mut body.cases {
                    for value in &mut case.associated_values {
                        self.stamp(&mut value.type_ref);
                    }
                }
            }
            DeclKind::Protocol(body) => {
                for associated in &mut body.associated_types {
                    if let Some(ty) = &mut associated.type_ref {
                        self.stamp(ty);
                    }
                }
                for requirement in &mut body.generic_requirements {
                    self.stamp(&mut requirement.right);
                }
            }
            DeclKind::ProtocolComposition(body) => {
                for ty in &mut body.composed {
                    self.stamp(ty);
                }
            }
            DeclKind::Class | DeclKind::Struct | DeclKind::Actor | DeclKind::Extension => {}
        }
    }

    fn lower_file(&mut self, result: ParseResult) {
        let ParseResult {
            file,
            module,
            imports,
            declarations,
            aliases,
            functions,
        } = result;
        let ctx = FileContext {
            file: &file,
            imports: &imports,
        };

        for alias in aliases {
            self.push_alias(alias, None, module.clone(), &ctx);
        }
        for declaration in declarations {
            self.lower_declaration(declaration, None, module.as_deref(), &ctx);
        }
        for mut method in functions {
            self.stamp_method(&mut method, None);
            self.lowered.functions.push(FunctionEntry {
                method,
                module: module.clone(),
                file: file.clone(),
                imports: imports.clone(),
            });
        }
    }

    fn push_alias(
        &mut self,
        mut alias: Alias,
        parent: Option<DeclId>,
        module: Option<String>,
        ctx: &FileContext<'_>,
    ) {
        self.stamp(&mut alias.target);
        self.lowered.aliases.push(AliasEntry {
            alias,
            module,
            parent,
            file: ctx.file.to_string(),
            imports: ctx.imports.to_vec(),
        });
    }

    fn lower_declaration(
        &mut self,
        declaration: Declaration,
        parent: Option<DeclId>,
        module: Option<&str>,
        ctx: &FileContext<'_>,
    ) -> DeclId {
        let Declaration {
            mut kind,
            name,
            module: own_module,
            access,
            inherited_types,
            children,
            mut variables,
            mut methods,
            mut subscripts,
            aliases,
            generic_parameters,
            attributes,
        } = declaration;
        let module = own_module.or_else(|| module.map(str::to_string));

        self.stamp_kind(&mut kind);
        let id = self.lowered.arena.push(DeclNode {
            id: DeclId(0),
            kind,
            local_name: name,
            module: module.clone(),
            file: ctx.file.to_string(),
            imports: ctx.imports.to_vec(),
            access,
            parent,
            children: Vec::new(),
            inherited_types: Vec::new(),
            variables: Vec::new(),
            methods: Vec::new(),
            subscripts: Vec::new(),
            generic_parameters,
            attributes,
            is_unknown_extension: false,
            merged_into: None,
            relations: Relations::default(),
            supertype: None,
            raw_type: None,
            composed_types: Vec::new(),
        });

        for variable in &mut variables {
            self.stamp_variable(variable, id);
        }
        for method in &mut methods {
            self.stamp_method(method, Some(id));
        }
        for subscript in &mut subscripts {
            self.stamp_subscript(subscript, id);
        }
        let node = &mut self.lowered.arena[id];
        node.set_inherited_types(inherited_types);
        node.variables = variables;
        node.methods = methods;
        node.subscripts = subscripts;

        for alias in aliases {
            self.push_alias(alias, Some(id), module.clone(), ctx);
        }
        for child in children {
            let child_id = self.lower_declaration(child, Some(id), module.as_deref(), ctx);
            self.lowered.arena[id].children.push(child_id);
        }
        id
    }

    fn stamp_variable(&mut self, variable: &mut Variable, owner: DeclId) {
        self.stamp(&mut variable.type_ref);
        variable.defined_in = Some(owner);
    }

    fn stamp_subscript(&mut self, subscript: &mut Subscript, owner: DeclId) {
        self.stamp_parameters(&mut subscript.parameters);
        self.stamp(&mut subscript.return_type);
        subscript.defined_in = Some(owner);
    }
}
