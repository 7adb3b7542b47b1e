//! The elaborator: hierarchy instantiation and runtime object creation.

use std::collections::HashMap;

use veld_common::{Ident, Interner};
use veld_diagnostics::{Diagnostic, DiagnosticSink};
use veld_ir::{simplify, Value};
use veld_layout::LayoutCache;
use veld_source::Loc;
use veld_tree::{TreeData, TreeRef, TreeStore};
use veld_types::{TypeNode, TypeRef, TypeTable};

use crate::const_eval::const_eval;
use crate::design::{Design, ProcessDef, Resolution, Scope, SignalDef, UnitIndex};
use crate::error::ElabError;
use crate::lower::{lower_process, EnvBinding};

/// Elaborates the design rooted at entity `top`.
///
/// Instantiates the hierarchy depth-first, binding generics and ports,
/// allocating signals with their layouts, and lowering processes to IR.
/// The first fatal error is reported through `sink` and returned.
pub fn elaborate(
    trees: &TreeStore,
    types: &TypeTable,
    interner: &Interner,
    sink: &DiagnosticSink,
    index: &UnitIndex,
    top: Ident,
) -> Result<Design, ElabError> {
    let mut elab = Elaborator {
        trees,
        types,
        interner,
        sink,
        index,
        layouts: LayoutCache::new(),
        design: Design::default(),
        instantiating: Vec::new(),
    };

    let result = elab
        .instantiate(top, top, None, HashMap::new(), HashMap::new(), Loc::DUMMY)
        .and_then(|_| elab.check_drivers());

    match result {
        Ok(()) => {
            // Queued instance-context hints are only useful on failure.
            sink.clear_hints();
            Ok(elab.design)
        }
        Err(err) => {
            sink.emit(Diagnostic::error(err.to_string()).at(err.loc()));
            Err(err)
        }
    }
}

struct Elaborator<'a> {
    trees: &'a TreeStore,
    types: &'a TypeTable,
    interner: &'a Interner,
    sink: &'a DiagnosticSink,
    index: &'a UnitIndex,
    layouts: LayoutCache,
    design: Design,
    instantiating: Vec<Ident>,
}

impl<'a> Elaborator<'a> {
    fn instantiate(
        &mut self,
        entity_name: Ident,
        path: Ident,
        parent: Option<usize>,
        generic_actuals: HashMap<Ident, Value>,
        port_bindings: HashMap<Ident, usize>,
        loc: Loc,
    ) -> Result<usize, ElabError> {
        if self.instantiating.contains(&entity_name) {
            return Err(ElabError::CircularInstantiation {
                name: self.interner.resolve(entity_name).to_string(),
                loc,
            });
        }
        self.sink.hint(format!(
            "while elaborating instance {}",
            self.interner.resolve(path)
        ));
        self.instantiating.push(entity_name);
        let result = self.instantiate_inner(entity_name, path, parent, generic_actuals, port_bindings, loc);
        self.instantiating.pop();
        result
    }

    fn instantiate_inner(
        &mut self,
        entity_name: Ident,
        path: Ident,
        parent: Option<usize>,
        generic_actuals: HashMap<Ident, Value>,
        port_bindings: HashMap<Ident, usize>,
        loc: Loc,
    ) -> Result<usize, ElabError> {
        let entity = self.index.entity(entity_name).ok_or_else(|| {
            ElabError::UnresolvedName {
                name: self.interner.resolve(entity_name).to_string(),
                loc,
            }
        })?;
        let arch = self.index.architecture_of(entity_name).ok_or_else(|| {
            ElabError::UnresolvedName {
                name: format!(
                    "architecture of {}",
                    self.interner.resolve(entity_name)
                ),
                loc,
            }
        })?;

        let scope = self.design.scopes.len();
        self.design.scopes.push(Scope {
            name: path,
            parent,
            children: Vec::new(),
            signals: Vec::new(),
            processes: Vec::new(),
        });
        if let Some(p) = parent {
            self.design.scopes[p].children.push(scope);
        }

        let mut env: HashMap<Ident, EnvBinding> = HashMap::new();
        let mut const_env: HashMap<Ident, Value> = HashMap::new();

        let TreeData::Entity {
            generics, ports, ..
        } = &self.trees.get(entity).data
        else {
            return Err(ElabError::Unsupported {
                detail: "top of instantiation is not an entity".to_string(),
                loc: self.trees.get(entity).loc,
            });
        };

        // Generics: actual, else default, else error.
        for generic in generics {
            let node = self.trees.get(*generic);
            let TreeData::GenericDecl { ident, ty, default } = &node.data else {
                continue;
            };
            let value = match generic_actuals.get(ident) {
                Some(v) => *v,
                None => match default {
                    Some(d) => const_eval(self.trees, self.interner, &const_env, *d)?,
                    None => {
                        return Err(ElabError::UnresolvedName {
                            name: format!(
                                "actual for generic {}",
                                self.interner.resolve(*ident)
                            ),
                            loc: node.loc,
                        })
                    }
                },
            };
            self.check_bounds(value, *ty, node.loc)?;
            const_env.insert(*ident, value);
            env.insert(*ident, EnvBinding::Const(value));
        }

        // Ports: bound to a parent signal, else a fresh local signal.
        for port in ports {
            let node = self.trees.get(*port);
            let TreeData::PortDecl {
                ident, ty, default, ..
            } = &node.data
            else {
                continue;
            };
            let flat = match port_bindings.get(ident) {
                Some(&flat) => {
                    let actual_ty = self.design.signals[flat].ty;
                    if !self.types.eq(*ty, actual_ty)
                        && !self.types.is_convertible(actual_ty, *ty)
                    {
                        return Err(ElabError::TypeMismatch {
                            detail: format!(
                                "port {} has type {} but actual has type {}",
                                self.interner.resolve(*ident),
                                self.types.pretty_vs(self.interner, *ty, actual_ty),
                                self.types.pretty_vs(self.interner, actual_ty, *ty),
                            ),
                            loc: node.loc,
                        });
                    }
                    flat
                }
                None => self.create_signal(scope, path, *ident, *ty, *default, &const_env, node.loc)?,
            };
            env.insert(*ident, EnvBinding::Signal(flat));
        }

        // Architecture declarative part.
        let TreeData::Architecture { decls, stmts, .. } = &self.trees.get(arch).data else {
            return Err(ElabError::Unsupported {
                detail: "architecture body expected".to_string(),
                loc: self.trees.get(arch).loc,
            });
        };

        for decl in decls {
            let node = self.trees.get(*decl);
            match &node.data {
                TreeData::SignalDecl { ident, ty, init } => {
                    let flat =
                        self.create_signal(scope, path, *ident, *ty, *init, &const_env, node.loc)?;
                    env.insert(*ident, EnvBinding::Signal(flat));
                }
                TreeData::ConstDecl { ident, value, .. } => {
                    let v = const_eval(self.trees, self.interner, &const_env, *value)?;
                    const_env.insert(*ident, v);
                    env.insert(*ident, EnvBinding::Const(v));
                }
                _ => {
                    return Err(ElabError::Unsupported {
                        detail: "declaration kind in architecture".to_string(),
                        loc: node.loc,
                    })
                }
            }
        }

        // Concurrent statements.
        for stmt in stmts {
            let node = self.trees.get(*stmt);
            match &node.data {
                TreeData::Process {
                    ident,
                    sensitivity,
                    decls,
                    body,
                } => {
                    let label = match ident {
                        Some(l) => *l,
                        None => self.interner.unique("proc"),
                    };
                    let name = self.interner.prefix(path, label, '.');
                    let lowered = lower_process(
                        self.trees,
                        self.interner,
                        &env,
                        name,
                        sensitivity,
                        decls,
                        body,
                    )?;

                    let mut unit = lowered.unit;
                    simplify(&mut unit);
                    let unit_id = self.design.pool.define(unit);

                    let static_sensitivity = sensitivity
                        .iter()
                        .map(|s| match env.get(s) {
                            Some(EnvBinding::Signal(flat)) => Ok(*flat),
                            _ => Err(ElabError::UnresolvedName {
                                name: self.interner.resolve(*s).to_string(),
                                loc: node.loc,
                            }),
                        })
                        .collect::<Result<Vec<_>, _>>()?;

                    let proc_index = self.design.processes.len();
                    self.design.processes.push(ProcessDef {
                        name,
                        unit: unit_id,
                        signal_map: lowered.signal_table,
                        sensitivity: static_sensitivity,
                        drives: lowered.drives,
                        scope,
                    });
                    self.design.scopes[scope].processes.push(proc_index);
                }
                TreeData::Instance {
                    ident,
                    entity,
                    generic_map,
                    port_map,
                } => {
                    let mut child_generics = HashMap::new();
                    for (formal, actual) in generic_map {
                        let v = const_eval(self.trees, self.interner, &const_env, *actual)?;
                        child_generics.insert(*formal, v);
                    }

                    let mut child_ports = HashMap::new();
                    for (formal, actual) in port_map {
                        let actual_node = self.trees.get(*actual);
                        let TreeData::Ref { ident: actual_name } = &actual_node.data else {
                            return Err(ElabError::Unsupported {
                                detail: "port actual must be a signal name".to_string(),
                                loc: actual_node.loc,
                            });
                        };
                        match env.get(actual_name) {
                            Some(EnvBinding::Signal(flat)) => {
                                child_ports.insert(*formal, *flat);
                            }
                            _ => {
                                return Err(ElabError::UnresolvedName {
                                    name: self.interner.resolve(*actual_name).to_string(),
                                    loc: actual_node.loc,
                                })
                            }
                        }
                    }

                    let child_path = self.interner.prefix(path, *ident, '.');
                    self.instantiate(
                        *entity,
                        child_path,
                        Some(scope),
                        child_generics,
                        child_ports,
                        node.loc,
                    )?;
                }
                _ => {
                    return Err(ElabError::Unsupported {
                        detail: "concurrent statement kind".to_string(),
                        loc: node.loc,
                    })
                }
            }
        }

        Ok(scope)
    }

    #[allow(clippy::too_many_arguments)]
    fn create_signal(
        &mut self,
        scope: usize,
        path: Ident,
        ident: Ident,
        ty: TypeRef,
        init: Option<TreeRef>,
        const_env: &HashMap<Ident, Value>,
        loc: Loc,
    ) -> Result<usize, ElabError> {
        let init_value = match init {
            Some(expr) => {
                let v = const_eval(self.trees, self.interner, const_env, expr)?;
                self.check_bounds(v, ty, self.trees.get(expr).loc)?;
                v
            }
            None => self.default_value(ty),
        };

        let layout = self.layouts.signal_layout_of(self.types, ty);
        let width_bytes = self.layouts.layout_of(self.types, ty).size;
        let resolution = self.resolution_of(ty, loc)?;

        let flat = self.design.signals.len();
        self.design.signals.push(SignalDef {
            name: self.interner.prefix(path, ident, '.'),
            ty,
            layout,
            width_bytes,
            init: init_value,
            resolution,
            scope,
            loc,
        });
        self.design.scopes[scope].signals.push(flat);
        Ok(flat)
    }

    /// The default initial value of a type is the leftmost value of its
    /// range.
    fn default_value(&self, ty: TypeRef) -> Value {
        let base = self.types.base_recur(ty);
        match self.types.get(base) {
            TypeNode::Real { range, .. } => Value::Real(range.low),
            TypeNode::Integer { range, .. } | TypeNode::Physical { range, .. } => {
                Value::Int(range.left)
            }
            _ => Value::Int(0),
        }
    }

    fn resolution_of(&self, ty: TypeRef, loc: Loc) -> Result<Resolution, ElabError> {
        match self.types.resolution_of(ty) {
            None => Ok(Resolution::None),
            Some(name) => {
                let text = self.interner.resolve(name);
                if text.eq_ignore_ascii_case("IEEE.std_logic_1164.RESOLVED")
                    || text.eq_ignore_ascii_case("resolved")
                {
                    Ok(Resolution::Ieee1164)
                } else {
                    // User resolution functions need a compiled body, which
                    // the front-end does not provide yet.
                    Err(ElabError::Unsupported {
                        detail: format!("resolution function {text}"),
                        loc,
                    })
                }
            }
        }
    }

    fn check_bounds(&self, value: Value, ty: TypeRef, loc: Loc) -> Result<(), ElabError> {
        if let (Value::Int(v), Some((low, high))) = (value, self.types.bounds(ty)) {
            if v < low || v > high {
                return Err(ElabError::ConstraintUnsatisfied {
                    value: v,
                    ty: self.types.pretty(self.interner, ty),
                    loc,
                });
            }
        }
        Ok(())
    }

    fn check_drivers(&self) -> Result<(), ElabError> {
        let mut driver_counts = vec![0usize; self.design.signals.len()];
        for process in &self.design.processes {
            for &flat in &process.drives {
                driver_counts[flat] += 1;
            }
        }
        for (flat, count) in driver_counts.iter().enumerate() {
            let signal = &self.design.signals[flat];
            if *count > 1 && signal.resolution == Resolution::None {
                return Err(ElabError::UnresolvedMultipleDrivers {
                    name: self.interner.resolve(signal.name).to_string(),
                    drivers: *count,
                    loc: signal.loc,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veld_tree::{BinaryOp, PortMode};
    use veld_types::StdTypes;

    struct Fixture {
        trees: TreeStore,
        types: TypeTable,
        interner: Interner,
        sink: DiagnosticSink,
        index: UnitIndex,
        std: StdTypes,
    }

    impl Fixture {
        fn new() -> Self {
            let mut types = TypeTable::new();
            let interner = Interner::new();
            let std = StdTypes::install(&mut types, &interner);
            Self {
                trees: TreeStore::new(),
                types,
                interner,
                sink: DiagnosticSink::new(),
                index: UnitIndex::new(),
                std,
            }
        }

        fn intern(&self, s: &str) -> Ident {
            self.interner.intern(s)
        }

        fn add_empty_entity(&mut self, name: &str) -> Ident {
            let ident = self.intern(name);
            let entity = self.trees.synth(TreeData::Entity {
                ident,
                generics: vec![],
                ports: vec![],
            });
            let arch = self.trees.synth(TreeData::Architecture {
                ident: self.interner.intern("rtl"),
                entity: ident,
                decls: vec![],
                stmts: vec![],
            });
            self.index.add_entity(ident, entity);
            self.index.add_architecture(ident, arch);
            ident
        }

        fn elaborate(&self, top: Ident) -> Result<Design, ElabError> {
            elaborate(
                &self.trees,
                &self.types,
                &self.interner,
                &self.sink,
                &self.index,
                top,
            )
        }
    }

    #[test]
    fn empty_entity_elaborates() {
        let mut f = Fixture::new();
        let top = f.add_empty_entity("top");
        let design = f.elaborate(top).unwrap();
        assert_eq!(design.scopes.len(), 1);
        assert!(design.signals.is_empty());
        assert!(design.processes.is_empty());
    }

    #[test]
    fn unknown_entity_is_unresolved() {
        let f = Fixture::new();
        let err = f.elaborate(f.intern("ghost")).unwrap_err();
        assert!(matches!(err, ElabError::UnresolvedName { .. }));
        assert!(f.sink.has_errors());
        // The queued instance-context hint attaches to the error.
        let diags = f.sink.take_all();
        assert!(diags[0]
            .hints
            .iter()
            .any(|h| h.contains("while elaborating instance ghost")));
    }

    #[test]
    fn successful_elaboration_leaves_no_stale_hints() {
        let mut f = Fixture::new();
        let top = f.add_empty_entity("top");
        f.elaborate(top).unwrap();
        // A later unrelated error must not pick up instance context.
        f.sink
            .emit(veld_diagnostics::Diagnostic::error("unrelated"));
        let diags = f.sink.take_all();
        assert!(diags.iter().all(|d| d.hints.is_empty()));
    }

    #[test]
    fn signal_declaration_allocates() {
        let mut f = Fixture::new();
        let top = f.intern("top");
        let entity = f.trees.synth(TreeData::Entity {
            ident: top,
            generics: vec![],
            ports: vec![],
        });
        let count = f.intern("count");
        let zero = f.trees.synth(TreeData::IntLit { value: 0 });
        let decl = f.trees.synth(TreeData::SignalDecl {
            ident: count,
            ty: f.std.integer,
            init: Some(zero),
        });
        let arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: top,
            decls: vec![decl],
            stmts: vec![],
        });
        f.index.add_entity(top, entity);
        f.index.add_architecture(top, arch);

        let design = f.elaborate(top).unwrap();
        assert_eq!(design.signals.len(), 1);
        let signal = &design.signals[0];
        assert_eq!(f.interner.resolve(signal.name), "top.count");
        assert_eq!(signal.init, Value::Int(0));
        assert_eq!(signal.width_bytes, 4);
        assert_eq!(signal.resolution, Resolution::None);
    }

    #[test]
    fn std_logic_signal_gets_ieee_resolution() {
        let mut f = Fixture::new();
        let top = f.intern("top");
        let entity = f.trees.synth(TreeData::Entity {
            ident: top,
            generics: vec![],
            ports: vec![],
        });
        let decl = f.trees.synth(TreeData::SignalDecl {
            ident: f.intern("bus"),
            ty: f.std.std_logic,
            init: None,
        });
        let arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: top,
            decls: vec![decl],
            stmts: vec![],
        });
        f.index.add_entity(top, entity);
        f.index.add_architecture(top, arch);

        let design = f.elaborate(top).unwrap();
        assert_eq!(design.signals[0].resolution, Resolution::Ieee1164);
        // Default initial value: leftmost of STD_ULOGIC, which is 'U'.
        assert_eq!(design.signals[0].init, Value::Int(0));
    }

    #[test]
    fn init_out_of_bounds_is_constraint_error() {
        let mut f = Fixture::new();
        let top = f.intern("top");
        let entity = f.trees.synth(TreeData::Entity {
            ident: top,
            generics: vec![],
            ports: vec![],
        });
        let big = f.trees.synth(TreeData::IntLit { value: 1 << 40 });
        let decl = f.trees.synth(TreeData::SignalDecl {
            ident: f.intern("s"),
            ty: f.std.integer,
            init: Some(big),
        });
        let arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: top,
            decls: vec![decl],
            stmts: vec![],
        });
        f.index.add_entity(top, entity);
        f.index.add_architecture(top, arch);

        assert!(matches!(
            f.elaborate(top),
            Err(ElabError::ConstraintUnsatisfied { .. })
        ));
    }

    #[test]
    fn process_is_lowered_and_registered() {
        let mut f = Fixture::new();
        let top = f.intern("top");
        let entity = f.trees.synth(TreeData::Entity {
            ident: top,
            generics: vec![],
            ports: vec![],
        });
        let count = f.intern("count");
        let zero = f.trees.synth(TreeData::IntLit { value: 0 });
        let decl = f.trees.synth(TreeData::SignalDecl {
            ident: count,
            ty: f.std.integer,
            init: Some(zero),
        });

        let target = f.trees.synth(TreeData::Ref { ident: count });
        let read = f.trees.synth(TreeData::Ref { ident: count });
        let one = f.trees.synth(TreeData::IntLit { value: 1 });
        let sum = f.trees.synth(TreeData::Binary {
            op: BinaryOp::Add,
            left: read,
            right: one,
        });
        let assign = f.trees.synth(TreeData::SignalAssign {
            target,
            value: sum,
            delay: None,
        });
        let ten_ns = f.trees.synth(TreeData::PhysLit {
            ty: f.std.time,
            value: 10_000_000,
        });
        let wait = f.trees.synth(TreeData::Wait {
            on: vec![],
            until: None,
            timeout: Some(ten_ns),
        });
        let process = f.trees.synth(TreeData::Process {
            ident: Some(f.intern("tick")),
            sensitivity: vec![],
            decls: vec![],
            body: vec![assign, wait],
        });
        let arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: top,
            decls: vec![decl],
            stmts: vec![process],
        });
        f.index.add_entity(top, entity);
        f.index.add_architecture(top, arch);

        let design = f.elaborate(top).unwrap();
        assert_eq!(design.processes.len(), 1);
        let process = &design.processes[0];
        assert_eq!(f.interner.resolve(process.name), "top.tick");
        assert_eq!(process.signal_map, vec![0]);
        assert_eq!(process.drives, vec![0]);
        assert_eq!(design.pool.len(), 1);
    }

    #[test]
    fn generic_default_and_actual() {
        let mut f = Fixture::new();
        let child_name = f.intern("child");
        let width = f.intern("WIDTH");
        let default = f.trees.synth(TreeData::IntLit { value: 4 });
        let generic = f.trees.synth(TreeData::GenericDecl {
            ident: width,
            ty: f.std.integer,
            default: Some(default),
        });
        let child_entity = f.trees.synth(TreeData::Entity {
            ident: child_name,
            generics: vec![generic],
            ports: vec![],
        });
        let child_arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: child_name,
            decls: vec![],
            stmts: vec![],
        });
        f.index.add_entity(child_name, child_entity);
        f.index.add_architecture(child_name, child_arch);

        let top = f.intern("top");
        let top_entity = f.trees.synth(TreeData::Entity {
            ident: top,
            generics: vec![],
            ports: vec![],
        });
        let eight = f.trees.synth(TreeData::IntLit { value: 8 });
        let instance = f.trees.synth(TreeData::Instance {
            ident: f.intern("u1"),
            entity: child_name,
            generic_map: vec![(width, eight)],
            port_map: vec![],
        });
        let top_arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: top,
            decls: vec![],
            stmts: vec![instance],
        });
        f.index.add_entity(top, top_entity);
        f.index.add_architecture(top, top_arch);

        let design = f.elaborate(top).unwrap();
        assert_eq!(design.scopes.len(), 2);
        assert_eq!(f.interner.resolve(design.scopes[1].name), "top.u1");
        assert_eq!(design.scopes[1].parent, Some(0));
        assert_eq!(design.scopes[0].children, vec![1]);
    }

    #[test]
    fn port_binding_shares_flat_signal() {
        let mut f = Fixture::new();

        // child with one input port feeding a local follower process.
        let child_name = f.intern("child");
        let din = f.intern("din");
        let port = f.trees.synth(TreeData::PortDecl {
            ident: din,
            mode: PortMode::In,
            ty: f.std.std_logic,
            default: None,
        });
        let child_entity = f.trees.synth(TreeData::Entity {
            ident: child_name,
            generics: vec![],
            ports: vec![port],
        });
        let child_arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: child_name,
            decls: vec![],
            stmts: vec![],
        });
        f.index.add_entity(child_name, child_entity);
        f.index.add_architecture(child_name, child_arch);

        let top = f.intern("top");
        let s = f.intern("s");
        let top_entity = f.trees.synth(TreeData::Entity {
            ident: top,
            generics: vec![],
            ports: vec![],
        });
        let decl = f.trees.synth(TreeData::SignalDecl {
            ident: s,
            ty: f.std.std_logic,
            init: None,
        });
        let actual = f.trees.synth(TreeData::Ref { ident: s });
        let instance = f.trees.synth(TreeData::Instance {
            ident: f.intern("u1"),
            entity: child_name,
            generic_map: vec![],
            port_map: vec![(din, actual)],
        });
        let top_arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: top,
            decls: vec![decl],
            stmts: vec![instance],
        });
        f.index.add_entity(top, top_entity);
        f.index.add_architecture(top, top_arch);

        let design = f.elaborate(top).unwrap();
        // One signal shared between parent and child: no extra allocation.
        assert_eq!(design.signals.len(), 1);
    }

    #[test]
    fn port_type_mismatch_detected() {
        let mut f = Fixture::new();

        let child_name = f.intern("child");
        let din = f.intern("din");
        let port = f.trees.synth(TreeData::PortDecl {
            ident: din,
            mode: PortMode::In,
            ty: f.std.std_logic,
            default: None,
        });
        let child_entity = f.trees.synth(TreeData::Entity {
            ident: child_name,
            generics: vec![],
            ports: vec![port],
        });
        let child_arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: child_name,
            decls: vec![],
            stmts: vec![],
        });
        f.index.add_entity(child_name, child_entity);
        f.index.add_architecture(child_name, child_arch);

        let top = f.intern("top");
        let s = f.intern("s");
        let top_entity = f.trees.synth(TreeData::Entity {
            ident: top,
            generics: vec![],
            ports: vec![],
        });
        let decl = f.trees.synth(TreeData::SignalDecl {
            ident: s,
            ty: f.std.integer,
            init: None,
        });
        let actual = f.trees.synth(TreeData::Ref { ident: s });
        let instance = f.trees.synth(TreeData::Instance {
            ident: f.intern("u1"),
            entity: child_name,
            generic_map: vec![],
            port_map: vec![(din, actual)],
        });
        let top_arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: top,
            decls: vec![decl],
            stmts: vec![instance],
        });
        f.index.add_entity(top, top_entity);
        f.index.add_architecture(top, top_arch);

        assert!(matches!(
            f.elaborate(top),
            Err(ElabError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn circular_instantiation_detected() {
        let mut f = Fixture::new();
        let a = f.intern("a");
        let entity = f.trees.synth(TreeData::Entity {
            ident: a,
            generics: vec![],
            ports: vec![],
        });
        let instance = f.trees.synth(TreeData::Instance {
            ident: f.intern("u1"),
            entity: a,
            generic_map: vec![],
            port_map: vec![],
        });
        let arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: a,
            decls: vec![],
            stmts: vec![instance],
        });
        f.index.add_entity(a, entity);
        f.index.add_architecture(a, arch);

        assert!(matches!(
            f.elaborate(a),
            Err(ElabError::CircularInstantiation { .. })
        ));
    }

    #[test]
    fn multiple_unresolved_drivers_rejected() {
        let mut f = Fixture::new();
        let top = f.intern("top");
        let s = f.intern("s");
        let entity = f.trees.synth(TreeData::Entity {
            ident: top,
            generics: vec![],
            ports: vec![],
        });
        let decl = f.trees.synth(TreeData::SignalDecl {
            ident: s,
            ty: f.std.bit,
            init: None,
        });

        let mut processes = Vec::new();
        for _ in 0..2 {
            let target = f.trees.synth(TreeData::Ref { ident: s });
            let value = f.trees.synth(TreeData::EnumLit {
                ty: f.std.bit,
                ordinal: 1,
            });
            let assign = f.trees.synth(TreeData::SignalAssign {
                target,
                value,
                delay: None,
            });
            let one_fs = f.trees.synth(TreeData::PhysLit {
                ty: f.std.time,
                value: 1,
            });
            let wait = f.trees.synth(TreeData::Wait {
                on: vec![],
                until: None,
                timeout: Some(one_fs),
            });
            processes.push(f.trees.synth(TreeData::Process {
                ident: None,
                sensitivity: vec![],
                decls: vec![],
                body: vec![assign, wait],
            }));
        }

        let arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: top,
            decls: vec![decl],
            stmts: processes,
        });
        f.index.add_entity(top, entity);
        f.index.add_architecture(top, arch);

        assert!(matches!(
            f.elaborate(top),
            Err(ElabError::UnresolvedMultipleDrivers { .. })
        ));
    }

    #[test]
    fn multiple_resolved_drivers_allowed() {
        let mut f = Fixture::new();
        let top = f.intern("top");
        let bus = f.intern("bus");
        let entity = f.trees.synth(TreeData::Entity {
            ident: top,
            generics: vec![],
            ports: vec![],
        });
        let decl = f.trees.synth(TreeData::SignalDecl {
            ident: bus,
            ty: f.std.std_logic,
            init: None,
        });

        let mut processes = Vec::new();
        for ordinal in [2u32, 4u32] {
            let target = f.trees.synth(TreeData::Ref { ident: bus });
            let value = f.trees.synth(TreeData::EnumLit {
                ty: f.std.std_logic,
                ordinal,
            });
            let assign = f.trees.synth(TreeData::SignalAssign {
                target,
                value,
                delay: None,
            });
            let one_fs = f.trees.synth(TreeData::PhysLit {
                ty: f.std.time,
                value: 1,
            });
            let wait = f.trees.synth(TreeData::Wait {
                on: vec![],
                until: None,
                timeout: Some(one_fs),
            });
            processes.push(f.trees.synth(TreeData::Process {
                ident: None,
                sensitivity: vec![],
                decls: vec![],
                body: vec![assign, wait],
            }));
        }

        let arch = f.trees.synth(TreeData::Architecture {
            ident: f.intern("rtl"),
            entity: top,
            decls: vec![decl],
            stmts: processes,
        });
        f.index.add_entity(top, entity);
        f.index.add_architecture(top, arch);

        let design = f.elaborate(top).unwrap();
        assert_eq!(design.signals[0].resolution, Resolution::Ieee1164);
        assert_eq!(design.processes.len(), 2);
    }
}
