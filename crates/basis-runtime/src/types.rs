//! Type registry for runtime type metadata
//!
//! Each type owns a name → method table. Method resolution walks from the
//! receiver's type up through its ancestors to `Obj`, so the base-object
//! protocol installed on `Obj` is the fallback for every managed object and
//! any type can override it.

use std::sync::Arc;

use basis_sdk::{
    AbiResult, Environment, MethodSignature, NativeError, NativeMethod, NativeMethodRegistry,
    TypeDescriptor, TypeId, ValueSlot,
};
use rustc_hash::FxHashMap;

use crate::defaults::{
    LIST_TYPE_ID, LIST_TYPE_NAME, OBJ_TYPE_ID, OBJ_TYPE_NAME, STR_TYPE_ID, STR_TYPE_NAME,
    TYPE_TYPE_ID, TYPE_TYPE_NAME,
};
use crate::protocol;

/// Per-type one-time initialization hook
pub type StaticInitFn = Arc<dyn Fn(&dyn Environment, TypeId) -> AbiResult<()> + Send + Sync>;

/// Runtime type definition
#[derive(Clone)]
pub struct RuntimeType {
    /// Type ID (index into the registry)
    pub id: TypeId,
    /// Type name
    pub name: String,
    /// Parent type ID (None only for `Obj`)
    pub parent_id: Option<TypeId>,
    /// Number of instance fields (including inherited)
    pub field_count: usize,
    /// Whether instances can be frozen
    pub freezable: bool,
    /// Methods declared on this type
    pub methods: NativeMethodRegistry,
    /// Static initializer (None = the no-op default)
    pub static_init: Option<StaticInitFn>,
}

impl RuntimeType {
    /// Read-only view handed to native code
    pub fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor {
            type_id: self.id,
            name: self.name.clone(),
            parent_id: self.parent_id,
            method_count: self.methods.len(),
            freezable: self.freezable,
        }
    }
}

impl std::fmt::Debug for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent_id", &self.parent_id)
            .field("field_count", &self.field_count)
            .field("freezable", &self.freezable)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Builder for user types
pub struct TypeBuilder {
    name: String,
    parent_id: TypeId,
    field_count: usize,
    freezable: bool,
    methods: NativeMethodRegistry,
    static_init: Option<StaticInitFn>,
}

impl TypeBuilder {
    /// Start a type deriving directly from `Obj`
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent_id: OBJ_TYPE_ID,
            field_count: 0,
            freezable: false,
            methods: NativeMethodRegistry::new(),
            static_init: None,
        }
    }

    /// Set the parent type
    pub fn parent(mut self, parent_id: TypeId) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Number of fields declared by this type (inherited fields are added on register)
    pub fn fields(mut self, count: usize) -> Self {
        self.field_count = count;
        self
    }

    /// Allow instances to be frozen with `toImmutable`
    pub fn freezable(mut self) -> Self {
        self.freezable = true;
        self
    }

    /// Declare a native method
    pub fn method(
        mut self,
        name: &str,
        signature: MethodSignature,
        body: impl Fn(&dyn Environment, &[ValueSlot]) -> AbiResult<ValueSlot> + Send + Sync + 'static,
    ) -> Self {
        self.methods.register(name, signature, body);
        self
    }

    /// Set the static initializer
    pub fn static_init(
        mut self,
        hook: impl Fn(&dyn Environment, TypeId) -> AbiResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.static_init = Some(Arc::new(hook));
        self
    }
}

/// Type registry for the runtime
#[derive(Debug)]
pub struct TypeRegistry {
    /// Types indexed by ID
    types: Vec<RuntimeType>,
    /// Type name to ID mapping
    name_to_id: FxHashMap<String, TypeId>,
}

impl TypeRegistry {
    /// Create a registry holding the built-in types
    pub fn new() -> Self {
        let mut registry = Self {
            types: Vec::new(),
            name_to_id: FxHashMap::default(),
        };

        let mut obj_methods = NativeMethodRegistry::new();
        protocol::install(&mut obj_methods);
        registry.push(OBJ_TYPE_NAME, None, 0, false, obj_methods);

        let mut str_methods = NativeMethodRegistry::new();
        protocol::install_value_type(&mut str_methods);
        str_methods.register(protocol::TO_STR, MethodSignature::none(), |_env, argv| {
            Ok(argv[0])
        });
        registry.push(STR_TYPE_NAME, Some(OBJ_TYPE_ID), 0, false, str_methods);

        registry.push(LIST_TYPE_NAME, Some(OBJ_TYPE_ID), 0, false, NativeMethodRegistry::new());

        let mut type_methods = NativeMethodRegistry::new();
        protocol::install_value_type(&mut type_methods);
        registry.push(TYPE_TYPE_NAME, Some(OBJ_TYPE_ID), 0, false, type_methods);

        debug_assert_eq!(registry.get_by_name(STR_TYPE_NAME).map(|t| t.id), Some(STR_TYPE_ID));
        debug_assert_eq!(registry.get_by_name(LIST_TYPE_NAME).map(|t| t.id), Some(LIST_TYPE_ID));
        debug_assert_eq!(registry.get_by_name(TYPE_TYPE_NAME).map(|t| t.id), Some(TYPE_TYPE_ID));
        registry
    }

    fn push(
        &mut self,
        name: &str,
        parent_id: Option<TypeId>,
        field_count: usize,
        freezable: bool,
        methods: NativeMethodRegistry,
    ) -> TypeId {
        let id = self.types.len();
        self.types.push(RuntimeType {
            id,
            name: name.to_string(),
            parent_id,
            field_count,
            freezable,
            methods,
            static_init: None,
        });
        self.name_to_id.insert(name.to_string(), id);
        id
    }

    /// Register a user type
    pub fn register(&mut self, builder: TypeBuilder) -> AbiResult<TypeId> {
        if builder.name.is_empty() {
            return Err("Type name cannot be empty".into());
        }
        if self.name_to_id.contains_key(&builder.name) {
            return Err(format!("Type {} already registered", builder.name).into());
        }
        let parent = self
            .get(builder.parent_id)
            .ok_or(NativeError::UnknownType(builder.parent_id))?;
        if matches!(parent.id, STR_TYPE_ID | LIST_TYPE_ID | TYPE_TYPE_ID) {
            return Err(format!("Type {} cannot be subclassed", parent.name).into());
        }
        let inherited_fields = parent.field_count;
        let freezable = builder.freezable || parent.freezable;

        let mut methods = builder.methods;
        if builder.freezable {
            protocol::install_freezable(&mut methods);
        }

        let id = self.push(
            &builder.name,
            Some(builder.parent_id),
            inherited_fields + builder.field_count,
            freezable,
            methods,
        );
        self.types[id].static_init = builder.static_init;
        Ok(id)
    }

    /// Get type by ID
    pub fn get(&self, id: TypeId) -> Option<&RuntimeType> {
        self.types.get(id)
    }

    /// Get type by name
    pub fn get_by_name(&self, name: &str) -> Option<&RuntimeType> {
        self.name_to_id.get(name).and_then(|id| self.types.get(*id))
    }

    /// Iterate from `id` up to the root type
    pub fn ancestors(&self, id: TypeId) -> impl Iterator<Item = &RuntimeType> {
        std::iter::successors(self.get(id), move |t| t.parent_id.and_then(|p| self.get(p)))
    }

    /// Whether `id` is `ancestor` or derives from it
    pub fn is_subtype(&self, id: TypeId, ancestor: TypeId) -> bool {
        self.ancestors(id).any(|t| t.id == ancestor)
    }

    /// Resolve a method by exact name on `id` or its nearest ancestor
    ///
    /// Returns the declaring type together with the method.
    pub fn resolve_method(&self, id: TypeId, name: &str) -> Option<(TypeId, &NativeMethod)> {
        self.ancestors(id)
            .find_map(|t| t.methods.get(name).map(|m| (t.id, m)))
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always false: the built-in types are registered on creation
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate over all types
    pub fn iter(&self) -> impl Iterator<Item = &RuntimeType> {
        self.types.iter()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
