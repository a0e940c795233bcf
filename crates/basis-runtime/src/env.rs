//! Reference environment
//!
//! Provides `RuntimeEnv`, a concrete implementation of
//! `basis_sdk::Environment` backed by an object arena and a type registry.
//! It is what the interpreter would supply; here it lets the protocol and
//! the dispatcher run end to end.
//!
//! # Locking
//!
//! The arena sits behind a `RwLock`. No lock is held while a resolved
//! method runs, so methods may call back into the environment and into the
//! dispatcher freely.
//!
//! Static initializers run under a reentrant lock: the initializing thread
//! may reenter dispatch on the type, while other threads block until the
//! hook has finished.

use std::io::Write;
use std::sync::Arc;

use basis_sdk::{
    AbiResult, Environment, NativeError, ObjHandle, TypeDescriptor, TypeId, ValueSlot,
};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::config::{RuntimeOptions, TrapArgPolicy};
use crate::defaults::{LIST_TYPE_ID, STR_TYPE_ID, TYPE_TYPE_ID};
use crate::heap::{Heap, ObjectData};
use crate::protocol;
use crate::trap;
use crate::types::TypeRegistry;

/// In-memory output sink, for embedders that want to capture `echo`.
#[derive(Debug, Clone, Default)]
pub struct OutputCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl OutputCapture {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }
}

impl Write for OutputCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Progress of a type's static initializer
#[derive(Debug, Clone)]
enum InitState {
    /// Hook is running on the thread holding `init_lock`
    Running,
    Done,
    /// Hook failed; every later use of the type reports this error
    Failed(NativeError),
}

/// Concrete `Environment` over an object arena and a type registry.
pub struct RuntimeEnv {
    /// Object arena
    heap: RwLock<Heap>,

    /// Type metadata (immutable once the environment exists)
    types: Arc<TypeRegistry>,

    /// One reflective type object per type, created on first request
    type_objects: Mutex<FxHashMap<TypeId, ObjHandle>>,

    /// Static initializer progress per type
    init_states: Mutex<FxHashMap<TypeId, InitState>>,

    /// Held while a static initializer runs. Reentrant so the hook may
    /// dispatch on its own type; other threads wait until it finishes.
    init_lock: ReentrantMutex<()>,

    /// Standard output sink used by `echo`
    stdout: Mutex<Box<dyn Write + Send>>,

    options: RuntimeOptions,
}

impl RuntimeEnv {
    /// Create an environment with default options
    pub fn new(types: TypeRegistry) -> Self {
        Self::with_options(Arc::new(types), RuntimeOptions::default())
    }

    /// Create an environment with specific options.
    ///
    /// The registry is shared so several environments can use one set of types.
    pub fn with_options(types: Arc<TypeRegistry>, options: RuntimeOptions) -> Self {
        debug!(
            types = types.len(),
            initial_capacity = options.initial_capacity,
            max_objects = ?options.max_objects,
            trap_args = ?options.trap_args,
            "creating runtime environment"
        );
        Self {
            heap: RwLock::new(Heap::new(options.initial_capacity, options.max_objects)),
            types,
            type_objects: Mutex::new(FxHashMap::default()),
            init_states: Mutex::new(FxHashMap::default()),
            init_lock: ReentrantMutex::new(()),
            stdout: Mutex::new(Box::new(std::io::stdout())),
            options,
        }
    }

    /// Replace the standard output sink
    pub fn with_output(self, sink: impl Write + Send + 'static) -> Self {
        *self.stdout.lock() = Box::new(sink);
        self
    }

    /// Options this environment was created with
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Type registry
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Number of live objects
    pub fn live_objects(&self) -> usize {
        self.heap.read().live_count()
    }

    /// Allocate an instance with null fields
    pub fn instantiate(&self, type_id: TypeId) -> AbiResult<ObjHandle> {
        let field_count = self.instance_type(type_id)?;
        self.ensure_initialized(type_id)?;
        let handle = self
            .heap
            .write()
            .allocate(type_id, ObjectData::Instance(vec![ValueSlot::null(); field_count]))?;
        trace!(type_id, ?handle, "instantiate");
        Ok(handle)
    }

    /// Allocate an instance with the given field values
    pub fn instantiate_with(&self, type_id: TypeId, fields: &[ValueSlot]) -> AbiResult<ObjHandle> {
        let field_count = self.instance_type(type_id)?;
        if fields.len() != field_count {
            return Err(NativeError::ArgumentMismatch {
                method: "instantiate".to_string(),
                expected: format!("{} fields", field_count),
                got: format!("{} fields", fields.len()),
            });
        }
        self.ensure_initialized(type_id)?;
        let mut heap = self.heap.write();
        check_handles(&heap, fields)?;
        heap.allocate(type_id, ObjectData::Instance(fields.to_vec()))
    }

    fn instance_type(&self, type_id: TypeId) -> AbiResult<usize> {
        let ty = self
            .types
            .get(type_id)
            .ok_or(NativeError::UnknownType(type_id))?;
        if matches!(type_id, STR_TYPE_ID | LIST_TYPE_ID | TYPE_TYPE_ID) {
            return Err(format!("{} cannot be instantiated directly", ty.name).into());
        }
        Ok(ty.field_count)
    }

    /// Run `finalize` on the object and reclaim it.
    ///
    /// Errors raised by `finalize` are logged and do not prevent reclamation.
    /// Type objects are pinned and cannot be released.
    pub fn release(&self, handle: ObjHandle) -> AbiResult<()> {
        if let ObjectData::TypeObject(_) = self.heap.read().get(handle)?.data {
            return Err("type objects cannot be released".into());
        }

        if let Err(e) = self.call_by_name(protocol::FINALIZE, &[ValueSlot::handle(handle)]) {
            warn!(?handle, error = %e, "finalize failed; reclaiming anyway");
        }

        let object = self.heap.write().release(handle)?;
        debug!(?handle, object_id = object.object_id, type_id = object.type_id, "released");
        Ok(())
    }

    /// Type described by a reflective type object
    pub fn reflect(&self, type_object: ObjHandle) -> AbiResult<TypeDescriptor> {
        let type_id = match self.heap.read().get(type_object)?.data {
            ObjectData::TypeObject(id) => id,
            ref other => {
                return Err(NativeError::TypeMismatch {
                    expected: "Type".to_string(),
                    got: other.kind_name().to_string(),
                })
            }
        };
        self.descriptor(type_id)
    }

    /// Trap with this environment's configured argument policy
    pub fn trap(
        &self,
        this: ObjHandle,
        method_name: &str,
        args: Option<&[ValueSlot]>,
    ) -> AbiResult<ValueSlot> {
        trap::trap_with_policy(self, self.options.trap_args, this, method_name, args)
    }

    fn descriptor(&self, type_id: TypeId) -> AbiResult<TypeDescriptor> {
        self.types
            .get(type_id)
            .map(|t| t.descriptor())
            .ok_or(NativeError::UnknownType(type_id))
    }

    /// Run static initializers from the root down to `type_id`, once each.
    ///
    /// A failed initializer is sticky: the type and its subtypes keep
    /// reporting the hook's error.
    fn ensure_initialized(&self, type_id: TypeId) -> AbiResult<()> {
        let chain: Vec<TypeId> = self.types.ancestors(type_id).map(|t| t.id).collect();
        if self.chain_done(&chain) {
            return Ok(());
        }

        let _guard = self.init_lock.lock();
        for id in chain.into_iter().rev() {
            match self.init_states.lock().get(&id) {
                Some(InitState::Done) => continue,
                Some(InitState::Failed(e)) => return Err(e.clone()),
                // reentry from the hook itself
                Some(InitState::Running) => continue,
                None => {}
            }
            self.init_states.lock().insert(id, InitState::Running);

            let ty = self.types.get(id).ok_or(NativeError::UnknownType(id))?;
            debug!(type_name = %ty.name, "static init");
            let result = match &ty.static_init {
                Some(hook) => hook(self, id),
                None => protocol::static_init(self, id),
            };
            match result {
                Ok(()) => {
                    self.init_states.lock().insert(id, InitState::Done);
                }
                Err(e) => {
                    warn!(type_name = %ty.name, error = %e, "static init failed");
                    self.init_states
                        .lock()
                        .insert(id, InitState::Failed(e.clone()));
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn chain_done(&self, chain: &[TypeId]) -> bool {
        let states = self.init_states.lock();
        chain
            .iter()
            .all(|id| matches!(states.get(id), Some(InitState::Done)))
    }

    fn with_data<T>(
        &self,
        val: ValueSlot,
        read: impl FnOnce(&ObjectData) -> Option<T>,
        expected: &str,
    ) -> AbiResult<T> {
        let handle = val.expect_handle()?;
        let heap = self.heap.read();
        let object = heap.get(handle)?;
        read(&object.data).ok_or_else(|| NativeError::TypeMismatch {
            expected: expected.to_string(),
            got: object.data.kind_name().to_string(),
        })
    }
}

fn check_handles(heap: &Heap, slots: &[ValueSlot]) -> AbiResult<()> {
    for slot in slots {
        if let Some(h) = slot.as_handle() {
            heap.get(h)?;
        }
    }
    Ok(())
}

impl Environment for RuntimeEnv {
    // ========================================================================
    // Dispatch
    // ========================================================================

    fn call_by_name(&self, method_name: &str, argv: &[ValueSlot]) -> AbiResult<ValueSlot> {
        let receiver = argv
            .first()
            .ok_or_else(|| NativeError::ArgumentMismatch {
                method: method_name.to_string(),
                expected: "receiver".to_string(),
                got: "()".to_string(),
            })?
            .expect_handle()?;

        let type_id = self.heap.read().get(receiver)?.type_id;
        self.ensure_initialized(type_id)?;
        let ty = self
            .types
            .get(type_id)
            .ok_or(NativeError::UnknownType(type_id))?;

        let (owner, method) = self
            .types
            .resolve_method(type_id, method_name)
            .ok_or_else(|| {
                debug!(type_name = %ty.name, method = method_name, "method not found");
                NativeError::MethodNotFound {
                    type_name: ty.name.clone(),
                    method: method_name.to_string(),
                }
            })?;

        trace!(
            method = method_name,
            type_name = %ty.name,
            owner,
            argc = argv.len() - 1,
            "dispatch"
        );
        method.invoke(self, method_name, argv)
    }

    fn trap_forwards_arguments(&self) -> bool {
        self.options.trap_args == TrapArgPolicy::Forward
    }

    // ========================================================================
    // Handles and identity
    // ========================================================================

    fn validate(&self, handle: ObjHandle) -> AbiResult<()> {
        self.heap.read().get(handle).map(|_| ())
    }

    fn object_id(&self, handle: ObjHandle) -> AbiResult<u64> {
        Ok(self.heap.read().get(handle)?.object_id)
    }

    // ========================================================================
    // Type metadata
    // ========================================================================

    fn type_of(&self, handle: ObjHandle) -> AbiResult<TypeDescriptor> {
        let type_id = self.heap.read().get(handle)?.type_id;
        self.descriptor(type_id)
    }

    fn type_object(&self, type_id: TypeId) -> AbiResult<ObjHandle> {
        if self.types.get(type_id).is_none() {
            return Err(NativeError::UnknownType(type_id));
        }
        let mut cache = self.type_objects.lock();
        if let Some(handle) = cache.get(&type_id) {
            return Ok(*handle);
        }
        let handle = self
            .heap
            .write()
            .allocate(TYPE_TYPE_ID, ObjectData::TypeObject(type_id))?;
        cache.insert(type_id, handle);
        Ok(handle)
    }

    // ========================================================================
    // Strings and lists
    // ========================================================================

    fn create_string(&self, s: &str) -> AbiResult<ObjHandle> {
        self.heap
            .write()
            .allocate(STR_TYPE_ID, ObjectData::Str(s.to_string()))
    }

    fn read_string(&self, val: ValueSlot) -> AbiResult<String> {
        self.with_data(
            val,
            |data| match data {
                ObjectData::Str(s) => Some(s.clone()),
                _ => None,
            },
            "Str",
        )
    }

    fn create_list(&self, items: &[ValueSlot]) -> AbiResult<ObjHandle> {
        let mut heap = self.heap.write();
        check_handles(&heap, items)?;
        heap.allocate(LIST_TYPE_ID, ObjectData::List(items.to_vec()))
    }

    fn read_list(&self, val: ValueSlot) -> AbiResult<Vec<ValueSlot>> {
        self.with_data(
            val,
            |data| match data {
                ObjectData::List(items) => Some(items.clone()),
                _ => None,
            },
            "List",
        )
    }

    // ========================================================================
    // Object state
    // ========================================================================

    fn get_field(&self, handle: ObjHandle, index: usize) -> AbiResult<ValueSlot> {
        let heap = self.heap.read();
        match &heap.get(handle)?.data {
            ObjectData::Instance(fields) => fields
                .get(index)
                .copied()
                .ok_or_else(|| NativeError::from(format!("Field index {} out of bounds", index))),
            other => Err(NativeError::TypeMismatch {
                expected: "instance".to_string(),
                got: other.kind_name().to_string(),
            }),
        }
    }

    fn set_field(&self, handle: ObjHandle, index: usize, value: ValueSlot) -> AbiResult<()> {
        let mut heap = self.heap.write();
        check_handles(&heap, &[value])?;
        let object = heap.get_mut(handle)?;
        if object.frozen {
            return Err("Cannot modify an immutable object".into());
        }
        match &mut object.data {
            ObjectData::Instance(fields) => {
                let len = fields.len();
                let slot = fields.get_mut(index).ok_or_else(|| {
                    NativeError::from(format!(
                        "Field index {} out of bounds (object has {} fields)",
                        index, len
                    ))
                })?;
                *slot = value;
                Ok(())
            }
            other => Err(NativeError::TypeMismatch {
                expected: "instance".to_string(),
                got: other.kind_name().to_string(),
            }),
        }
    }

    fn is_frozen(&self, handle: ObjHandle) -> AbiResult<bool> {
        Ok(self.heap.read().get(handle)?.frozen)
    }

    fn freeze(&self, handle: ObjHandle) -> AbiResult<()> {
        self.heap.write().get_mut(handle)?.frozen = true;
        Ok(())
    }

    // ========================================================================
    // Output
    // ========================================================================

    fn write_stdout(&self, line: &str) -> AbiResult<()> {
        let mut out = self.stdout.lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for RuntimeEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeEnv")
            .field("live_objects", &self.live_objects())
            .field("types", &self.types.len())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::OBJ_TYPE_ID;
    use crate::types::TypeBuilder;
    use basis_sdk::{MethodSignature, SlotKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_strings_roundtrip() {
        let env = RuntimeEnv::new(TypeRegistry::new());
        let s = env.create_string("héllo").unwrap();
        assert_eq!(env.read_string(ValueSlot::handle(s)).unwrap(), "héllo");
        assert_eq!(env.type_of(s).unwrap().name, "Str");
    }

    #[test]
    fn test_read_string_rejects_other_objects() {
        let env = RuntimeEnv::new(TypeRegistry::new());
        let list = env.create_list(&[]).unwrap();
        let err = env.read_string(ValueSlot::handle(list)).unwrap_err();
        assert_eq!(
            err,
            NativeError::TypeMismatch {
                expected: "Str".to_string(),
                got: "List".to_string()
            }
        );
    }

    #[test]
    fn test_fields() {
        let mut types = TypeRegistry::new();
        let widget = types.register(TypeBuilder::new("Widget").fields(2)).unwrap();
        let env = RuntimeEnv::new(types);

        let w = env.instantiate(widget).unwrap();
        assert!(env.get_field(w, 0).unwrap().is_null());
        env.set_field(w, 1, ValueSlot::small_int(9)).unwrap();
        assert_eq!(env.get_field(w, 1).unwrap().as_int(), Some(9));
        assert!(env.get_field(w, 2).is_err());
        assert!(env.set_field(w, 2, ValueSlot::null()).is_err());
    }

    #[test]
    fn test_instantiate_with_checks_field_count() {
        let mut types = TypeRegistry::new();
        let widget = types.register(TypeBuilder::new("Widget").fields(2)).unwrap();
        let env = RuntimeEnv::new(types);

        let err = env
            .instantiate_with(widget, &[ValueSlot::small_int(1)])
            .unwrap_err();
        assert!(matches!(err, NativeError::ArgumentMismatch { .. }));
        assert!(env.instantiate(STR_TYPE_ID).is_err());
        assert_eq!(env.instantiate(77).unwrap_err(), NativeError::UnknownType(77));
    }

    #[test]
    fn test_type_object_cached_and_pinned() {
        let env = RuntimeEnv::new(TypeRegistry::new());
        let t1 = env.type_object(OBJ_TYPE_ID).unwrap();
        let t2 = env.type_object(OBJ_TYPE_ID).unwrap();
        assert_eq!(t1, t2);
        assert_eq!(env.reflect(t1).unwrap().name, "Obj");
        assert_eq!(env.type_of(t1).unwrap().name, "Type");
        assert!(env.release(t1).is_err());
        assert!(env.validate(t1).is_ok());
    }

    #[test]
    fn test_static_init_runs_once_root_first() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut types = TypeRegistry::new();
        let o1 = order.clone();
        let shape = types
            .register(TypeBuilder::new("Shape").static_init(move |_env, _id| {
                o1.lock().push("Shape");
                Ok(())
            }))
            .unwrap();
        let o2 = order.clone();
        let widget = types
            .register(TypeBuilder::new("Widget").parent(shape).static_init(move |_env, _id| {
                o2.lock().push("Widget");
                Ok(())
            }))
            .unwrap();
        let env = RuntimeEnv::new(types);

        env.instantiate(widget).unwrap();
        env.instantiate(widget).unwrap();
        env.instantiate(shape).unwrap();
        assert_eq!(*order.lock(), vec!["Shape", "Widget"]);
    }

    #[test]
    fn test_static_init_may_reenter() {
        let mut types = TypeRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let widget = types
            .register(TypeBuilder::new("Widget").static_init(move |env, _id| {
                c.fetch_add(1, Ordering::SeqCst);
                let s = env.create_string("init")?;
                env.call_by_name(protocol::TO_STR, &[ValueSlot::handle(s)])?;
                Ok(())
            }))
            .unwrap();
        let env = RuntimeEnv::new(types);
        let w = env.instantiate(widget).unwrap();
        env.trap(w, protocol::HASH, None).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_static_init_is_sticky() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let mut types = TypeRegistry::new();
        let broken = types
            .register(TypeBuilder::new("Broken").static_init(move |_env, _id| {
                c.fetch_add(1, Ordering::SeqCst);
                Err("init failed".into())
            }))
            .unwrap();
        let child = types.register(TypeBuilder::new("BrokenChild").parent(broken)).unwrap();
        let env = RuntimeEnv::new(types);

        let expected = NativeError::AbiError("init failed".to_string());
        assert_eq!(env.instantiate(broken).unwrap_err(), expected);
        assert_eq!(env.instantiate(broken).unwrap_err(), expected);
        assert_eq!(env.instantiate(child).unwrap_err(), expected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(env.live_objects(), 0);
    }

    #[test]
    fn test_static_init_blocks_other_threads() {
        let finished = Arc::new(AtomicUsize::new(0));
        let f = finished.clone();
        let mut types = TypeRegistry::new();
        let slow = types
            .register(TypeBuilder::new("Slow").static_init(move |_env, _id| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
        let env = RuntimeEnv::new(types);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    env.instantiate(slow).unwrap();
                    // no thread gets an instance before the hook completed
                    assert_eq!(finished.load(Ordering::SeqCst), 1);
                });
            }
        });
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(env.live_objects(), 4);
    }

    #[test]
    fn test_release_runs_finalize() {
        let finalized = Arc::new(AtomicUsize::new(0));
        let f = finalized.clone();
        let mut types = TypeRegistry::new();
        let widget = types
            .register(TypeBuilder::new("Widget").method(
                protocol::FINALIZE,
                MethodSignature::none(),
                move |_env, _argv| {
                    f.fetch_add(1, Ordering::SeqCst);
                    Ok(ValueSlot::null())
                },
            ))
            .unwrap();
        let env = RuntimeEnv::new(types);
        let w = env.instantiate(widget).unwrap();

        env.release(w).unwrap();
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
        assert_eq!(env.validate(w).unwrap_err(), NativeError::InvalidHandle(w));
        assert_eq!(env.live_objects(), 0);
    }

    #[test]
    fn test_failing_finalize_still_reclaims() {
        let mut types = TypeRegistry::new();
        let widget = types
            .register(TypeBuilder::new("Widget").method(
                protocol::FINALIZE,
                MethodSignature::none(),
                |_env, _argv| Err("finalizer blew up".into()),
            ))
            .unwrap();
        let env = RuntimeEnv::new(types);
        let w = env.instantiate(widget).unwrap();
        env.release(w).unwrap();
        assert!(env.validate(w).is_err());
    }

    #[test]
    fn test_create_list_rejects_stale_items() {
        let env = RuntimeEnv::new(TypeRegistry::new());
        let s = env.create_string("x").unwrap();
        env.release(s).unwrap();
        let err = env.create_list(&[ValueSlot::handle(s)]).unwrap_err();
        assert_eq!(err, NativeError::InvalidHandle(s));
    }

    #[test]
    fn test_object_limit_surfaces() {
        let env = RuntimeEnv::with_options(
            Arc::new(TypeRegistry::new()),
            RuntimeOptions::with_object_limit(1),
        );
        env.create_string("a").unwrap();
        let err = env.create_string("b").unwrap_err();
        assert_eq!(err, NativeError::HeapExhausted { limit: 1 });
    }

    #[test]
    fn test_write_stdout_capture() {
        let capture = OutputCapture::new();
        let env = RuntimeEnv::new(TypeRegistry::new()).with_output(capture.clone());
        env.write_stdout("one").unwrap();
        env.write_stdout("two").unwrap();
        assert_eq!(capture.contents(), "one\ntwo\n");
    }

    #[test]
    fn test_call_by_name_requires_receiver() {
        let mut types = TypeRegistry::new();
        let _ = types.register(TypeBuilder::new("Widget").method(
            "id",
            MethodSignature::exact([SlotKind::Any]),
            |_env, argv| Ok(argv[1]),
        ));
        let env = RuntimeEnv::new(types);
        let err = env.call_by_name("id", &[]).unwrap_err();
        assert!(matches!(err, NativeError::ArgumentMismatch { .. }));
        let err = env.call_by_name("id", &[ValueSlot::small_int(1)]).unwrap_err();
        assert!(matches!(err, NativeError::TypeMismatch { .. }));
    }
}
