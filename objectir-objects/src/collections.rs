//! System.Collections.Generic: List, Dictionary, Queue, Stack, HashSet.
//! Each instance keeps its buffer in the object's host-data slot; the
//! interpreted program only ever sees `Value`s.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use objectir_common::{ErrorKind, IrError, Result};
use objectir_ir::{ArrayObj, Method, ObjectRef, TypeDef, TypeRef, Value};

use crate::{arg, to_i32, HostIo, HostRegistry};

type ListBuf = RefCell<Vec<Value>>;
type MapBuf = RefCell<HashMap<Value, Value>>;
type QueueBuf = RefCell<VecDeque<Value>>;
type SetBuf = RefCell<HashSet<Value>>;

const NS: &str = "System.Collections.Generic";

pub(crate) fn classes() -> Vec<TypeDef> {
    vec![list_class(), dictionary_class(), queue_class(), stack_class(), hash_set_class()]
}

pub(crate) fn register(reg: &mut HostRegistry) {
    register_list(reg);
    register_dictionary(reg);
    register_queue(reg);
    register_stack(reg);
    register_hash_set(reg);
}

fn ctor() -> Method {
    let mut m = Method::new(".ctor", TypeRef::VOID, false);
    m.is_ctor = true;
    m
}

fn data<T: 'static>(this: Option<&ObjectRef>, what: &str) -> Result<Rc<T>> {
    let obj = this.ok_or_else(|| {
        IrError::new(ErrorKind::Host, format!("{} method requires an instance", what))
    })?;
    obj.borrow().data::<T>().ok_or_else(|| {
        IrError::new(ErrorKind::Host, format!("{} instance is not initialized; call .ctor first", what))
    })
}

fn values_to_array(values: Vec<Value>) -> Value {
    let arr = ArrayObj::new(TypeRef::OBJECT);
    for (i, v) in values.into_iter().enumerate() {
        arr.set(i, v);
    }
    Value::Array(Rc::new(arr))
}

// --- List`1 ---

fn list_class() -> TypeDef {
    let mut c = TypeDef::class("List`1");
    c.namespace = NS.to_string();
    c.methods.push(ctor());
    c.methods.push(ctor().param("capacity", TypeRef::INT32));
    c.methods.push(Method::new("get_Count", TypeRef::INT32, false));
    c.methods.push(Method::new("get_Item", TypeRef::OBJECT, false).param("index", TypeRef::INT32));
    c.methods.push(
        Method::new("set_Item", TypeRef::VOID, false)
            .param("index", TypeRef::INT32)
            .param("value", TypeRef::OBJECT),
    );
    c.methods.push(Method::new("Add", TypeRef::VOID, false).param("item", TypeRef::OBJECT));
    c.methods.push(
        Method::new("Insert", TypeRef::VOID, false)
            .param("index", TypeRef::INT32)
            .param("item", TypeRef::OBJECT),
    );
    c.methods.push(Method::new("RemoveAt", TypeRef::VOID, false).param("index", TypeRef::INT32));
    c.methods.push(Method::new("Remove", TypeRef::BOOL, false).param("item", TypeRef::OBJECT));
    c.methods.push(Method::new("Clear", TypeRef::VOID, false));
    c.methods.push(Method::new("Contains", TypeRef::BOOL, false).param("item", TypeRef::OBJECT));
    c.methods.push(Method::new("IndexOf", TypeRef::INT32, false).param("item", TypeRef::OBJECT));
    c.methods.push(Method::new("ToArray", TypeRef::OBJECT, false));
    c
}

fn register_list(reg: &mut HostRegistry) {
    let t = "System.Collections.Generic.List`1";
    reg.register(&format!("{t}..ctor()"), list_ctor);
    reg.register(&format!("{t}..ctor(int32)"), list_ctor_capacity);
    reg.register(&format!("{t}.get_Count()"), list_count);
    reg.register(&format!("{t}.get_Item(int32)"), list_get_item);
    reg.register(&format!("{t}.set_Item(int32,object)"), list_set_item);
    reg.register(&format!("{t}.Add(object)"), list_add);
    reg.register(&format!("{t}.Insert(int32,object)"), list_insert);
    reg.register(&format!("{t}.RemoveAt(int32)"), list_remove_at);
    reg.register(&format!("{t}.Remove(object)"), list_remove);
    reg.register(&format!("{t}.Clear()"), list_clear);
    reg.register(&format!("{t}.Contains(object)"), list_contains);
    reg.register(&format!("{t}.IndexOf(object)"), list_index_of);
    reg.register(&format!("{t}.ToArray()"), list_to_array);
}

fn list_ctor(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let obj = this.ok_or_else(|| IrError::new(ErrorKind::Host, "List constructor requires an instance"))?;
    obj.borrow_mut().set_data(Rc::new(ListBuf::new(Vec::new())));
    Ok(Value::Null)
}

fn list_ctor_capacity(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let obj = this.ok_or_else(|| IrError::new(ErrorKind::Host, "List constructor requires an instance"))?;
    let capacity = to_i32(&arg(args, 0)).max(0) as usize;
    obj.borrow_mut().set_data(Rc::new(ListBuf::new(Vec::with_capacity(capacity))));
    Ok(Value::Null)
}

fn list_count(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let list = data::<ListBuf>(this, "List")?;
    let n = list.borrow().len();
    Ok(Value::Int32(n as i32))
}

fn list_get_item(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let list = data::<ListBuf>(this, "List")?;
    let index = to_i32(&arg(args, 0));
    if index < 0 {
        return Ok(Value::Null);
    }
    let v = list.borrow().get(index as usize).cloned().unwrap_or(Value::Null);
    Ok(v)
}

fn list_set_item(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let list = data::<ListBuf>(this, "List")?;
    let index = to_i32(&arg(args, 0));
    let mut buf = list.borrow_mut();
    if index >= 0 && (index as usize) < buf.len() {
        buf[index as usize] = arg(args, 1);
    }
    Ok(Value::Null)
}

fn list_add(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let list = data::<ListBuf>(this, "List")?;
    list.borrow_mut().push(arg(args, 0));
    Ok(Value::Null)
}

fn list_insert(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let list = data::<ListBuf>(this, "List")?;
    let index = to_i32(&arg(args, 0));
    let mut buf = list.borrow_mut();
    let index = (index.max(0) as usize).min(buf.len());
    buf.insert(index, arg(args, 1));
    Ok(Value::Null)
}

fn list_remove_at(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let list = data::<ListBuf>(this, "List")?;
    let index = to_i32(&arg(args, 0));
    let mut buf = list.borrow_mut();
    if index >= 0 && (index as usize) < buf.len() {
        buf.remove(index as usize);
    }
    Ok(Value::Null)
}

fn list_remove(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let list = data::<ListBuf>(this, "List")?;
    let needle = arg(args, 0);
    let mut buf = list.borrow_mut();
    match buf.iter().position(|v| *v == needle) {
        Some(i) => {
            buf.remove(i);
            Ok(Value::Bool(true))
        }
        None => Ok(Value::Bool(false)),
    }
}

fn list_clear(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let list = data::<ListBuf>(this, "List")?;
    list.borrow_mut().clear();
    Ok(Value::Null)
}

fn list_contains(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let list = data::<ListBuf>(this, "List")?;
    let needle = arg(args, 0);
    let found = list.borrow().iter().any(|v| *v == needle);
    Ok(Value::Bool(found))
}

fn list_index_of(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let list = data::<ListBuf>(this, "List")?;
    let needle = arg(args, 0);
    let pos = list.borrow().iter().position(|v| *v == needle);
    match pos {
        Some(i) => Ok(Value::Int32(i as i32)),
        None => Ok(Value::Int32(-1)),
    }
}

fn list_to_array(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let list = data::<ListBuf>(this, "List")?;
    let values = list.borrow().clone();
    Ok(values_to_array(values))
}

// --- Dictionary`2 ---

fn dictionary_class() -> TypeDef {
    let mut c = TypeDef::class("Dictionary`2");
    c.namespace = NS.to_string();
    c.methods.push(ctor());
    c.methods.push(Method::new("get_Count", TypeRef::INT32, false));
    c.methods.push(Method::new("get_Item", TypeRef::OBJECT, false).param("key", TypeRef::OBJECT));
    c.methods.push(
        Method::new("set_Item", TypeRef::VOID, false)
            .param("key", TypeRef::OBJECT)
            .param("value", TypeRef::OBJECT),
    );
    c.methods.push(
        Method::new("Add", TypeRef::VOID, false)
            .param("key", TypeRef::OBJECT)
            .param("value", TypeRef::OBJECT),
    );
    c.methods.push(Method::new("Remove", TypeRef::BOOL, false).param("key", TypeRef::OBJECT));
    c.methods.push(Method::new("Clear", TypeRef::VOID, false));
    c.methods.push(Method::new("ContainsKey", TypeRef::BOOL, false).param("key", TypeRef::OBJECT));
    c.methods.push(Method::new("ContainsValue", TypeRef::BOOL, false).param("value", TypeRef::OBJECT));
    c.methods.push(Method::new("get_Keys", TypeRef::OBJECT, false));
    c.methods.push(Method::new("get_Values", TypeRef::OBJECT, false));
    c
}

fn register_dictionary(reg: &mut HostRegistry) {
    let t = "System.Collections.Generic.Dictionary`2";
    reg.register(&format!("{t}..ctor()"), dict_ctor);
    reg.register(&format!("{t}.get_Count()"), dict_count);
    reg.register(&format!("{t}.get_Item(object)"), dict_get_item);
    reg.register(&format!("{t}.set_Item(object,object)"), dict_set_item);
    reg.register(&format!("{t}.Add(object,object)"), dict_set_item);
    reg.register(&format!("{t}.Remove(object)"), dict_remove);
    reg.register(&format!("{t}.Clear()"), dict_clear);
    reg.register(&format!("{t}.ContainsKey(object)"), dict_contains_key);
    reg.register(&format!("{t}.ContainsValue(object)"), dict_contains_value);
    reg.register(&format!("{t}.get_Keys()"), dict_keys);
    reg.register(&format!("{t}.get_Values()"), dict_values);
}

fn dict_ctor(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let obj = this.ok_or_else(|| IrError::new(ErrorKind::Host, "Dictionary constructor requires an instance"))?;
    obj.borrow_mut().set_data(Rc::new(MapBuf::new(HashMap::new())));
    Ok(Value::Null)
}

fn dict_count(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let map = data::<MapBuf>(this, "Dictionary")?;
    let n = map.borrow().len();
    Ok(Value::Int32(n as i32))
}

fn dict_get_item(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let map = data::<MapBuf>(this, "Dictionary")?;
    let v = map.borrow().get(&arg(args, 0)).cloned().unwrap_or(Value::Null);
    Ok(v)
}

fn dict_set_item(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let map = data::<MapBuf>(this, "Dictionary")?;
    map.borrow_mut().insert(arg(args, 0), arg(args, 1));
    Ok(Value::Null)
}

fn dict_remove(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let map = data::<MapBuf>(this, "Dictionary")?;
    let removed = map.borrow_mut().remove(&arg(args, 0)).is_some();
    Ok(Value::Bool(removed))
}

fn dict_clear(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let map = data::<MapBuf>(this, "Dictionary")?;
    map.borrow_mut().clear();
    Ok(Value::Null)
}

fn dict_contains_key(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let map = data::<MapBuf>(this, "Dictionary")?;
    let found = map.borrow().contains_key(&arg(args, 0));
    Ok(Value::Bool(found))
}

fn dict_contains_value(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let map = data::<MapBuf>(this, "Dictionary")?;
    let needle = arg(args, 0);
    let found = map.borrow().values().any(|v| *v == needle);
    Ok(Value::Bool(found))
}

fn dict_keys(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let map = data::<MapBuf>(this, "Dictionary")?;
    let keys: Vec<Value> = map.borrow().keys().cloned().collect();
    Ok(values_to_array(keys))
}

fn dict_values(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let map = data::<MapBuf>(this, "Dictionary")?;
    let values: Vec<Value> = map.borrow().values().cloned().collect();
    Ok(values_to_array(values))
}

// --- Queue`1 ---

fn queue_class() -> TypeDef {
    let mut c = TypeDef::class("Queue`1");
    c.namespace = NS.to_string();
    c.methods.push(ctor());
    c.methods.push(Method::new("get_Count", TypeRef::INT32, false));
    c.methods.push(Method::new("Enqueue", TypeRef::VOID, false).param("item", TypeRef::OBJECT));
    c.methods.push(Method::new("Dequeue", TypeRef::OBJECT, false));
    c.methods.push(Method::new("Peek", TypeRef::OBJECT, false));
    c.methods.push(Method::new("Clear", TypeRef::VOID, false));
    c.methods.push(Method::new("Contains", TypeRef::BOOL, false).param("item", TypeRef::OBJECT));
    c
}

fn register_queue(reg: &mut HostRegistry) {
    let t = "System.Collections.Generic.Queue`1";
    reg.register(&format!("{t}..ctor()"), queue_ctor);
    reg.register(&format!("{t}.get_Count()"), queue_count);
    reg.register(&format!("{t}.Enqueue(object)"), queue_enqueue);
    reg.register(&format!("{t}.Dequeue()"), queue_dequeue);
    reg.register(&format!("{t}.Peek()"), queue_peek);
    reg.register(&format!("{t}.Clear()"), queue_clear);
    reg.register(&format!("{t}.Contains(object)"), queue_contains);
}

fn queue_ctor(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let obj = this.ok_or_else(|| IrError::new(ErrorKind::Host, "Queue constructor requires an instance"))?;
    obj.borrow_mut().set_data(Rc::new(QueueBuf::new(VecDeque::new())));
    Ok(Value::Null)
}

fn queue_count(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let queue = data::<QueueBuf>(this, "Queue")?;
    let n = queue.borrow().len();
    Ok(Value::Int32(n as i32))
}

fn queue_enqueue(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let queue = data::<QueueBuf>(this, "Queue")?;
    queue.borrow_mut().push_back(arg(args, 0));
    Ok(Value::Null)
}

fn queue_dequeue(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let queue = data::<QueueBuf>(this, "Queue")?;
    let v = queue.borrow_mut().pop_front().unwrap_or(Value::Null);
    Ok(v)
}

fn queue_peek(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let queue = data::<QueueBuf>(this, "Queue")?;
    let v = queue.borrow().front().cloned().unwrap_or(Value::Null);
    Ok(v)
}

fn queue_clear(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let queue = data::<QueueBuf>(this, "Queue")?;
    queue.borrow_mut().clear();
    Ok(Value::Null)
}

fn queue_contains(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let queue = data::<QueueBuf>(this, "Queue")?;
    let needle = arg(args, 0);
    let found = queue.borrow().iter().any(|v| *v == needle);
    Ok(Value::Bool(found))
}

// --- Stack`1 ---

fn stack_class() -> TypeDef {
    let mut c = TypeDef::class("Stack`1");
    c.namespace = NS.to_string();
    c.methods.push(ctor());
    c.methods.push(Method::new("get_Count", TypeRef::INT32, false));
    c.methods.push(Method::new("Push", TypeRef::VOID, false).param("item", TypeRef::OBJECT));
    c.methods.push(Method::new("Pop", TypeRef::OBJECT, false));
    c.methods.push(Method::new("Peek", TypeRef::OBJECT, false));
    c.methods.push(Method::new("Clear", TypeRef::VOID, false));
    c.methods.push(Method::new("Contains", TypeRef::BOOL, false).param("item", TypeRef::OBJECT));
    c
}

fn register_stack(reg: &mut HostRegistry) {
    let t = "System.Collections.Generic.Stack`1";
    reg.register(&format!("{t}..ctor()"), stack_ctor);
    reg.register(&format!("{t}.get_Count()"), list_count);
    reg.register(&format!("{t}.Push(object)"), list_add);
    reg.register(&format!("{t}.Pop()"), stack_pop);
    reg.register(&format!("{t}.Peek()"), stack_peek);
    reg.register(&format!("{t}.Clear()"), list_clear);
    reg.register(&format!("{t}.Contains(object)"), list_contains);
}

fn stack_ctor(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let obj = this.ok_or_else(|| IrError::new(ErrorKind::Host, "Stack constructor requires an instance"))?;
    obj.borrow_mut().set_data(Rc::new(ListBuf::new(Vec::new())));
    Ok(Value::Null)
}

fn stack_pop(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let stack = data::<ListBuf>(this, "Stack")?;
    let v = stack.borrow_mut().pop().unwrap_or(Value::Null);
    Ok(v)
}

fn stack_peek(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let stack = data::<ListBuf>(this, "Stack")?;
    let v = stack.borrow().last().cloned().unwrap_or(Value::Null);
    Ok(v)
}

// --- HashSet`1 ---

fn hash_set_class() -> TypeDef {
    let mut c = TypeDef::class("HashSet`1");
    c.namespace = NS.to_string();
    c.methods.push(ctor());
    c.methods.push(Method::new("get_Count", TypeRef::INT32, false));
    c.methods.push(Method::new("Add", TypeRef::BOOL, false).param("item", TypeRef::OBJECT));
    c.methods.push(Method::new("Remove", TypeRef::BOOL, false).param("item", TypeRef::OBJECT));
    c.methods.push(Method::new("Clear", TypeRef::VOID, false));
    c.methods.push(Method::new("Contains", TypeRef::BOOL, false).param("item", TypeRef::OBJECT));
    c
}

fn register_hash_set(reg: &mut HostRegistry) {
    let t = "System.Collections.Generic.HashSet`1";
    reg.register(&format!("{t}..ctor()"), set_ctor);
    reg.register(&format!("{t}.get_Count()"), set_count);
    reg.register(&format!("{t}.Add(object)"), set_add);
    reg.register(&format!("{t}.Remove(object)"), set_remove);
    reg.register(&format!("{t}.Clear()"), set_clear);
    reg.register(&format!("{t}.Contains(object)"), set_contains);
}

fn set_ctor(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let obj = this.ok_or_else(|| IrError::new(ErrorKind::Host, "HashSet constructor requires an instance"))?;
    obj.borrow_mut().set_data(Rc::new(SetBuf::new(HashSet::new())));
    Ok(Value::Null)
}

fn set_count(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let set = data::<SetBuf>(this, "HashSet")?;
    let n = set.borrow().len();
    Ok(Value::Int32(n as i32))
}

fn set_add(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let set = data::<SetBuf>(this, "HashSet")?;
    let inserted = set.borrow_mut().insert(arg(args, 0));
    Ok(Value::Bool(inserted))
}

fn set_remove(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let set = data::<SetBuf>(this, "HashSet")?;
    let removed = set.borrow_mut().remove(&arg(args, 0));
    Ok(Value::Bool(removed))
}

fn set_clear(this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let set = data::<SetBuf>(this, "HashSet")?;
    set.borrow_mut().clear();
    Ok(Value::Null)
}

fn set_contains(this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let set = data::<SetBuf>(this, "HashSet")?;
    let found = set.borrow().contains(&arg(args, 0));
    Ok(Value::Bool(found))
}
