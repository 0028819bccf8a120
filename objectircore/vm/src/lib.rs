/*

 ▄▄▄▄    ██▓    ▄▄▄       ▄████▄   ██ ▄█▀ ██▀███   █    ██   ██████  ██░ ██
▓█████▄ ▓██▒   ▒████▄    ▒██▀ ▀█   ██▄█▒ ▓██ ▒ ██▒ ██  ▓██▒▒██    ▒ ▓██░ ██▒
▒██▒ ▄██▒██░   ▒██  ▀█▄  ▒▓█    ▄ ▓███▄░ ▓██ ░▄█ ▒▓██  ▒██░░ ▓██▄   ▒██▀▀██░
▒██░█▀  ▒██░   ░██▄▄▄▄██ ▒▓▓▄ ▄██▒▓██ █▄ ▒██▀▀█▄  ▓▓█  ░██░  ▒   ██▒░▓█ ░██
░▓█  ▀█▓░██████▒▓█   ▓██▒▒ ▓███▀ ░▒██▒ █▄░██▓ ▒██▒▒▒█████▓ ▒██████▒▒░▓█▒░██▓
░▒▓███▀▒░ ▒░▓  ░▒▒   ▓▒█░░ ░▒ ▒  ░▒ ▒▒ ▓▒░ ▒▓ ░▒▓░░▒▓▒ ▒ ▒ ▒ ▒▓▒ ▒ ░ ▒ ░░▒░▒
▒░▒   ░ ░ ░ ▒  ░ ▒   ▒▒ ░  ░  ▒   ░ ░▒ ▒░  ░▒ ░ ▒░░░▒░ ░ ░ ░ ░▒  ░ ░ ▒ ░▒░ ░
 ░    ░   ░ ░    ░   ▒   ░        ░ ░░ ░   ░░   ░  ░░░ ░ ░ ░  ░  ░   ░  ░░ ░
 ░          ░  ░     ░  ░░ ░      ░  ░      ░        ░           ░   ░  ░  ░
      ░                  ░
Copyright (C) 2026, Blackrush LLC, All Rights Reserved
Created by Erik Olson, Tarpon Springs, Florida
For more information, visit BlackrushDrive.com

MIT License

Copyright (c) 2026 Erik Lee Olson for Blackrush, LLC

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.

*/

//! Frame-based interpreter: call stack, opcode dispatch, structured
//! control flow, overload resolution, static fields, host bridge.
mod classes;
pub mod coerce;

pub use classes::{ClassDef, ClassGraph, MethodLoc};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use objectir_common::{ErrorKind, IrError, Result};
use objectir_ir::{
    normalize_type_name, ArrayObj, BranchTarget, CallTarget, ClassId, Condition, Instruction,
    Method, Module, ObjInstance, ObjectRef, OpCode, Operand, TryData, TypeRef, Value,
};
use objectir_objects::{register_objects, stdlib_types, HostIo, HostRegistry, OutputFn};

const DEFAULT_RECURSION_LIMIT: usize = 1024;

/// Error in flight, optionally carrying the thrown program value so a
/// catch block can push it back on the eval stack.
struct Raised {
    error: IrError,
    value: Option<Value>,
}

impl From<IrError> for Raised {
    fn from(error: IrError) -> Self {
        Self { error, value: None }
    }
}

type Exec<T> = std::result::Result<T, Raised>;

/// How a nested block finished. `break`/`continue` travel as signals to
/// the nearest enclosing loop; `ret` unwinds to the frame boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockExit {
    Normal,
    Break,
    Continue,
    Return,
}

/// Per-invocation state: the method, its instruction pointer, the
/// evaluation stack, arguments (positional, addressable by name), locals
/// and the implicit instance.
pub struct Frame {
    method: Rc<Method>,
    ip: usize,
    stack: Vec<Value>,
    args: Vec<Value>,
    locals: HashMap<String, Value>,
    this: Option<ObjectRef>,
}

impl Frame {
    fn new(method: Rc<Method>, mut args: Vec<Value>, this: Option<ObjectRef>) -> Self {
        if args.len() < method.params.len() {
            args.resize(method.params.len(), Value::Null);
        }
        let locals = method
            .locals
            .iter()
            .map(|l| (l.name.clone(), Value::Null))
            .collect();
        Self { method, ip: 0, stack: Vec::new(), args, locals, this }
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| IrError::new(ErrorKind::StackUnderflow, "Stack underflow"))
    }

    fn peek(&self) -> Result<&Value> {
        self.stack
            .last()
            .ok_or_else(|| IrError::new(ErrorKind::StackUnderflow, "Stack underflow"))
    }

    fn local(&self, name: &str) -> Result<Value> {
        self.locals.get(name).cloned().ok_or_else(|| {
            IrError::new(ErrorKind::NotFound, format!("Local variable not found: {}", name))
        })
    }

    fn set_local(&mut self, name: &str, value: Value) -> Result<()> {
        match self.locals.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(IrError::new(
                ErrorKind::NotFound,
                format!("Local variable not found: {}", name),
            )),
        }
    }

    fn argument(&self, name: &str) -> Result<Value> {
        if name == "this" {
            return Ok(match &self.this {
                Some(obj) => Value::Object(obj.clone()),
                None => Value::Null,
            });
        }
        let index = self
            .method
            .params
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| IrError::new(ErrorKind::NotFound, format!("Argument not found: {}", name)))?;
        Ok(self.args.get(index).cloned().unwrap_or(Value::Null))
    }

    fn argument_at(&self, index: usize) -> Result<Value> {
        self.args
            .get(index)
            .cloned()
            .ok_or_else(|| IrError::new(ErrorKind::NotFound, format!("Argument index out of range: {}", index)))
    }

    fn set_argument(&mut self, name: &str, value: Value) -> Result<()> {
        let index = self
            .method
            .params
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| IrError::new(ErrorKind::NotFound, format!("Argument not found: {}", name)))?;
        if index >= self.args.len() {
            self.args.resize(index + 1, Value::Null);
        }
        self.args[index] = value;
        Ok(())
    }
}

/// The virtual machine. Owns the class arena, the static-field store and
/// the host registry; single-threaded and cooperative.
pub struct Vm {
    classes: ClassGraph,
    statics: HashMap<(String, String), Value>,
    host: HostRegistry,
    io: HostIo,
    resolve_cache: HashMap<(ClassId, String, String, bool), MethodLoc>,
    on_exception: Option<Box<dyn FnMut(&IrError)>>,
    depth: usize,
    max_depth: usize,
}

impl Vm {
    pub fn new() -> Self {
        let mut classes = ClassGraph::new();
        for def in stdlib_types() {
            classes.register(def);
        }
        let mut host = HostRegistry::new();
        register_objects(&mut host);
        Self {
            classes,
            statics: HashMap::new(),
            host,
            io: HostIo::new(),
            resolve_cache: HashMap::new(),
            on_exception: None,
            depth: 0,
            max_depth: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Redirects console output (tests capture the stream through this).
    pub fn set_output(&mut self, output: OutputFn) {
        self.io.set_output(output);
    }

    /// Observes every error that starts unwinding, caught or not.
    pub fn set_exception_hook(&mut self, hook: Box<dyn FnMut(&IrError)>) {
        self.on_exception = Some(hook);
    }

    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.max_depth = limit;
    }

    pub fn classes(&self) -> &ClassGraph {
        &self.classes
    }

    /// Registers every type of an already-parsed module. Registration
    /// invalidates cached resolutions since new overloads may shadow.
    pub fn load_module(&mut self, module: Module) {
        debug!(module = %module.name, types = module.types.len(), "loading module");
        for ty in module.types {
            self.classes.register(ty);
        }
        self.resolve_cache.clear();
    }

    pub fn register_host_method(&mut self, signature: &str, f: objectir_objects::NativeFn) {
        self.host.register(signature, f);
    }

    /// Current value of a static field, if ever written.
    pub fn static_field(&self, declaring_type: &str, name: &str) -> Option<Value> {
        let qualified = self
            .classes
            .lookup(declaring_type)
            .map(|id| self.classes.class(id).qualified.clone())
            .unwrap_or_else(|| declaring_type.to_string());
        self.statics.get(&(qualified, name.to_string())).cloned()
    }

    /// Allocates an instance with null-initialized field slots for the
    /// class and its ancestors. Constructors run separately.
    pub fn create_object(&mut self, type_name: &str) -> Result<Value> {
        let id = self.classes.get(type_name)?;
        if self.classes.class(id).kind != objectir_ir::TypeKind::Class {
            return Err(IrError::new(
                ErrorKind::TypeMismatch,
                format!("Cannot instantiate non-class type: {}", type_name),
            ));
        }
        let mut obj = ObjInstance::new(id);
        for cid in self.classes.ancestry(id) {
            for field in &self.classes.class(cid).fields {
                if !field.is_static {
                    obj.init_field_slot(&field.name);
                }
            }
        }
        Ok(Value::Object(Rc::new(RefCell::new(obj))))
    }

    /// Convention entry point: static `Main` on a class named `Program`.
    pub fn run_main(&mut self, cli_args: &[String]) -> Result<Value> {
        self.run_entry("Program", "Main", cli_args)
    }

    /// Runs `class.method` as a static entry, passing the CLI arguments
    /// as a string array when the signature asks for one.
    pub fn run_entry(&mut self, class_name: &str, method_name: &str, cli_args: &[String]) -> Result<Value> {
        let class = self.classes.get(class_name)?;
        let candidates: Vec<MethodLoc> = self
            .classes
            .collect_methods_by_name(class, method_name)
            .into_iter()
            .filter(|loc| self.classes.method(*loc).is_static)
            .collect();
        if candidates.is_empty() {
            return Err(IrError::new(
                ErrorKind::NotFound,
                format!("Static method not found: {}.{}", class_name, method_name),
            ));
        }

        let zero_arg = candidates.iter().copied().find(|loc| self.classes.method(*loc).params.is_empty());
        let one_arg = candidates.iter().copied().find(|loc| self.classes.method(*loc).params.len() == 1);
        let loc = if cli_args.is_empty() {
            zero_arg.or(one_arg).unwrap_or(candidates[0])
        } else {
            one_arg.or(zero_arg).unwrap_or(candidates[0])
        };

        let args = if self.classes.method(loc).params.len() == 1 {
            let arr = ArrayObj::new(TypeRef::STRING);
            for (i, a) in cli_args.iter().enumerate() {
                arr.set(i, Value::Str(a.clone()));
            }
            vec![Value::Array(Rc::new(arr))]
        } else {
            Vec::new()
        };

        let result = self.invoke_resolved(loc, None, args);
        self.finish(result)
    }

    /// Name-only static invocation; the name must resolve uniquely.
    pub fn invoke_static(&mut self, class_name: &str, method_name: &str, args: Vec<Value>) -> Result<Value> {
        let class = self.classes.get(class_name)?;
        let loc = self.resolve_cached(class, method_name, &[], true)?;
        let result = self.invoke_resolved(loc, None, args);
        self.finish(result)
    }

    /// Name-only instance invocation against the object's class.
    pub fn invoke_instance(&mut self, object: &ObjectRef, method_name: &str, args: Vec<Value>) -> Result<Value> {
        let class = object.borrow().class;
        let loc = self.resolve_cached(class, method_name, &[], false)?;
        let result = self.invoke_resolved(loc, Some(object.clone()), args);
        self.finish(result)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn finish(&mut self, result: Exec<Value>) -> Result<Value> {
        match result {
            Ok(v) => Ok(v),
            Err(raised) => {
                self.notify_exception(&raised.error);
                debug!(error = %raised.error, "uncaught error drained the call stack");
                Err(raised.error)
            }
        }
    }

    fn notify_exception(&mut self, error: &IrError) {
        if let Some(hook) = &mut self.on_exception {
            hook(error);
        }
    }

    fn resolve_cached(
        &mut self,
        class: ClassId,
        name: &str,
        parameter_types: &[String],
        require_static: bool,
    ) -> Result<MethodLoc> {
        let key = (class, name.to_string(), parameter_types.join(","), require_static);
        if let Some(loc) = self.resolve_cache.get(&key) {
            return Ok(*loc);
        }
        let loc = classes::resolve_overload(&self.classes, class, name, parameter_types, require_static)?;
        trace!(class = class.0, method = name, "resolved overload");
        self.resolve_cache.insert(key, loc);
        Ok(loc)
    }

    /// Runs a resolved method: interpreted body when it has one,
    /// otherwise the host registry under the method's signature key.
    fn invoke_resolved(&mut self, loc: MethodLoc, this: Option<ObjectRef>, args: Vec<Value>) -> Exec<Value> {
        let method = self.classes.method(loc).clone();
        if method.has_instructions() {
            return self.execute_method(method, this, args);
        }

        let key = self.classes.method_signature_key(loc);
        if let Some(f) = self.host.get(&key) {
            trace!(signature = %key, "host dispatch");
            let ret = f(this.as_ref(), &args, &mut self.io)?;
            return Ok(ret);
        }

        Err(Raised::from(IrError::new(
            ErrorKind::NotFound,
            format!("Method has no implementation: {}", method.name),
        )))
    }

    fn execute_method(&mut self, method: Rc<Method>, this: Option<ObjectRef>, args: Vec<Value>) -> Exec<Value> {
        if self.depth >= self.max_depth {
            return Err(Raised::from(IrError::new(
                ErrorKind::RecursionLimit,
                format!("Call depth exceeded {} frames", self.max_depth),
            )));
        }
        self.depth += 1;
        let is_void = method.return_type.is_void();
        let mut frame = Frame::new(method, args, this);
        let result = self.run_frame(&mut frame);
        self.depth -= 1;

        // A void method discards any residual value.
        result.map(|v| if is_void { Value::Null } else { v })
    }

    /// The per-frame dispatch loop. Branches and `ret` mutate/terminate
    /// the IP here; everything else goes through `exec`.
    fn run_frame(&mut self, frame: &mut Frame) -> Exec<Value> {
        let method = frame.method.clone();
        let instructions = &method.instructions;

        while frame.ip < instructions.len() {
            let instr = &instructions[frame.ip];
            trace!(method = %method.name, ip = frame.ip, op = %instr.op, "dispatch");

            match instr.op {
                OpCode::Br => {
                    frame.ip = self.branch_target(&method, instr, instructions.len())?;
                    continue;
                }
                OpCode::BrTrue | OpCode::BrFalse => {
                    let cond = coerce::to_bool(&frame.pop()?);
                    let take = if instr.op == OpCode::BrTrue { cond } else { !cond };
                    if take {
                        frame.ip = self.branch_target(&method, instr, instructions.len())?;
                    } else {
                        frame.ip += 1;
                    }
                    continue;
                }
                OpCode::Beq | OpCode::Bne | OpCode::Bgt | OpCode::Bge | OpCode::Blt | OpCode::Ble => {
                    let right = frame.pop()?;
                    let left = frame.pop()?;
                    if coerce::compare(instr.op, &left, &right)? {
                        frame.ip = self.branch_target(&method, instr, instructions.len())?;
                    } else {
                        frame.ip += 1;
                    }
                    continue;
                }
                _ => {}
            }

            match self.exec(instr, frame)? {
                BlockExit::Normal => frame.ip += 1,
                BlockExit::Return => return Ok(frame.stack.pop().unwrap_or(Value::Null)),
                BlockExit::Break | BlockExit::Continue => {
                    return Err(Raised::from(IrError::new(
                        ErrorKind::MalformedOperand,
                        format!("'{}' outside of loop", instr.op),
                    )));
                }
            }
        }

        Ok(frame.stack.pop().unwrap_or(Value::Null))
    }

    fn branch_target(&self, method: &Method, instr: &Instruction, len: usize) -> Exec<usize> {
        let target = match &instr.operand {
            Operand::Branch(BranchTarget::Index(i)) => *i,
            Operand::Branch(BranchTarget::Label(label)) => match method.label_map.get(label) {
                Some(i) => *i,
                None => label.parse::<usize>().map_err(|_| {
                    Raised::from(IrError::new(
                        ErrorKind::BranchOutOfRange,
                        format!("Branch target not found: {}", label),
                    ))
                })?,
            },
            _ => {
                return Err(Raised::from(IrError::new(
                    ErrorKind::MalformedOperand,
                    format!("{} missing branch target", instr.op),
                )))
            }
        };
        if target >= len {
            return Err(Raised::from(IrError::new(
                ErrorKind::BranchOutOfRange,
                format!("Branch target out of range: {}", target),
            )));
        }
        Ok(target)
    }

    /// Runs a nested instruction block; label branches are frame-level
    /// only and are rejected here.
    fn exec_block(&mut self, instrs: &[Instruction], frame: &mut Frame) -> Exec<BlockExit> {
        for instr in instrs {
            if instr.op.is_branch() {
                return Err(Raised::from(IrError::new(
                    ErrorKind::MalformedOperand,
                    "Branch opcodes are only valid at method level",
                )));
            }
            match self.exec(instr, frame)? {
                BlockExit::Normal => {}
                exit => return Ok(exit),
            }
        }
        Ok(BlockExit::Normal)
    }

    /// Straight-line execution for condition operands; control-flow
    /// escapes make no sense there.
    fn exec_linear(&mut self, instrs: &[Instruction], frame: &mut Frame) -> Exec<()> {
        for instr in instrs {
            match self.exec(instr, frame)? {
                BlockExit::Normal => {}
                _ => {
                    return Err(Raised::from(IrError::new(
                        ErrorKind::MalformedOperand,
                        "Control flow cannot escape a condition",
                    )))
                }
            }
        }
        Ok(())
    }

    fn eval_condition(&mut self, condition: &Condition, frame: &mut Frame) -> Exec<bool> {
        match condition {
            Condition::Stack => Ok(coerce::to_bool(&frame.pop()?)),
            Condition::Binary { op, left, right } => {
                if !op.is_comparison() {
                    return Err(Raised::from(IrError::new(
                        ErrorKind::MalformedOperand,
                        format!("Unsupported comparison opcode in binary condition: {}", op),
                    )));
                }
                self.exec_linear(left, frame)?;
                self.exec_linear(right, frame)?;
                let rhs = frame.pop()?;
                let lhs = frame.pop()?;
                Ok(coerce::compare(*op, &lhs, &rhs)?)
            }
            Condition::Expression(instr) => {
                self.exec_linear(std::slice::from_ref(instr), frame)?;
                Ok(coerce::to_bool(&frame.pop()?))
            }
            Condition::Block(body) => {
                self.exec_linear(body, frame)?;
                Ok(coerce::to_bool(&frame.pop()?))
            }
        }
    }

    fn exec_try(&mut self, data: &TryData, frame: &mut Frame) -> Exec<BlockExit> {
        let outcome = match self.exec_block(&data.try_block, frame) {
            Ok(exit) => Ok(exit),
            Err(raised) => {
                let mut handled = None;
                for catch in &data.catches {
                    if self.catch_matches(&catch.exception_type, &raised) {
                        // Caught errors are still observable through the hook.
                        self.notify_exception(&raised.error);
                        let payload = raised
                            .value
                            .clone()
                            .unwrap_or_else(|| Value::Str(raised.error.message.clone()));
                        frame.push(payload);
                        handled = Some(self.exec_block(&catch.block, frame));
                        break;
                    }
                }
                handled.unwrap_or(Err(raised))
            }
        };

        // The finally block always runs on the way out; its own
        // error/exit overrides the pending outcome.
        if !data.finally_block.is_empty() {
            match self.exec_block(&data.finally_block, frame)? {
                BlockExit::Normal => {}
                exit => return Ok(exit),
            }
        }
        outcome
    }

    fn catch_matches(&self, exception_type: &str, raised: &Raised) -> bool {
        if exception_type.is_empty() {
            return true;
        }
        match &raised.value {
            Some(Value::Object(obj)) => self.classes.is_instance_of(obj.borrow().class, exception_type),
            Some(other) => normalize_type_name(exception_type) == other.type_name(),
            None => {
                exception_type == raised.error.kind.name() || exception_type == "Exception"
            }
        }
    }

    fn exec_call(&mut self, target: &CallTarget, virt: bool, frame: &mut Frame) -> Exec<()> {
        let argc = target.parameter_types.len();
        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            args.push(frame.pop()?);
        }
        args.reverse();

        let this = if virt {
            match frame.pop()? {
                Value::Object(obj) => Some(obj),
                other => {
                    return Err(Raised::from(IrError::new(
                        ErrorKind::TypeMismatch,
                        format!(
                            "CallVirt requires an object instance on the stack (got {})",
                            other.type_name()
                        ),
                    )))
                }
            }
        } else {
            None
        };

        // Host registry first: a fully-typed call target already carries
        // the signature key.
        if let Some(f) = self.host.get(&target.signature_key()) {
            trace!(signature = %target.signature_key(), "host dispatch");
            let ret = f(this.as_ref(), &args, &mut self.io)?;
            if !target.is_void_return() {
                frame.push(ret);
            }
            return Ok(());
        }

        // callvirt dispatches on the instance's class so overrides win;
        // call goes through the declaring type.
        let class = match &this {
            Some(obj) => obj.borrow().class,
            None => self.classes.get(&target.declaring_type)?,
        };
        let loc = self.resolve_cached(class, &target.name, &target.parameter_types, !virt)?;
        let method = self.classes.method(loc).clone();
        let ret = self.invoke_resolved(loc, this, args)?;
        if !method.return_type.is_void() {
            frame.push(ret);
        }
        Ok(())
    }

    fn exec(&mut self, instr: &Instruction, frame: &mut Frame) -> Exec<BlockExit> {
        match instr.op {
            OpCode::Nop => {}
            OpCode::Dup => {
                let top = frame.peek()?.clone();
                frame.push(top);
            }
            OpCode::Pop => {
                frame.pop()?;
            }

            OpCode::LdNull => frame.push(Value::Null),
            OpCode::LdTrue => frame.push(Value::Bool(true)),
            OpCode::LdFalse => frame.push(Value::Bool(false)),
            OpCode::LdI4 => frame.push(Value::Int32(operand_int(instr)? as i32)),
            OpCode::LdI8 => frame.push(Value::Int64(operand_int(instr)?)),
            OpCode::LdR4 => frame.push(Value::Float32(operand_float(instr)? as f32)),
            OpCode::LdR8 => frame.push(Value::Float64(operand_float(instr)?)),
            OpCode::LdC | OpCode::LdStr => frame.push(constant_value(instr)?),

            OpCode::LdLoc => {
                let name = operand_name(instr)?;
                let v = frame.local(name)?;
                frame.push(v);
            }
            OpCode::StLoc => {
                let name = operand_name(instr)?.to_string();
                let v = frame.pop()?;
                frame.set_local(&name, v)?;
            }
            OpCode::LdArg => {
                let v = match &instr.operand {
                    Operand::Name(name) => frame.argument(name)?,
                    Operand::Index(index) => frame.argument_at(*index)?,
                    _ => return Err(malformed(instr, "argument name")),
                };
                frame.push(v);
            }
            OpCode::StArg => {
                let name = operand_name(instr)?.to_string();
                let v = frame.pop()?;
                frame.set_argument(&name, v)?;
            }

            OpCode::LdFld => {
                let name = operand_field_name(instr)?;
                let instance = self.field_instance(frame, false)?;
                let v = instance.borrow().get_field(name).ok_or_else(|| {
                    Raised::from(IrError::new(ErrorKind::NotFound, format!("Field not found: {}", name)))
                })?;
                frame.push(v);
            }
            OpCode::StFld => {
                let name = operand_field_name(instr)?.to_string();
                let v = frame.pop()?;
                let instance = self.field_instance(frame, true)?;
                instance.borrow_mut().set_field(&name, v);
            }
            OpCode::LdSFld => {
                let (declaring, name) = operand_static_field(instr)?;
                let v = self.load_static(declaring, name)?;
                frame.push(v);
            }
            OpCode::StSFld => {
                let (declaring, name) = operand_static_field(instr)?;
                let declaring = declaring.to_string();
                let name = name.to_string();
                let v = frame.pop()?;
                self.store_static(&declaring, &name, v)?;
            }

            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Rem => {
                let right = frame.pop()?;
                let left = frame.pop()?;
                frame.push(coerce::arithmetic(instr.op, &left, &right)?);
            }
            OpCode::Neg => {
                let v = frame.pop()?;
                frame.push(coerce::negate(&v)?);
            }
            OpCode::Not => {
                let v = frame.pop()?;
                frame.push(Value::Bool(!coerce::to_bool(&v)));
            }

            OpCode::Ceq | OpCode::Cne | OpCode::Clt | OpCode::Cle | OpCode::Cgt | OpCode::Cge => {
                let right = frame.pop()?;
                let left = frame.pop()?;
                frame.push(Value::Bool(coerce::compare(instr.op, &left, &right)?));
            }

            OpCode::NewObj => {
                let type_name = operand_type_name(instr)?;
                let obj = self.create_object(type_name)?;
                frame.push(obj);
            }
            OpCode::NewArr => {
                let elem = operand_type_name(instr)?;
                frame.push(Value::Array(Rc::new(ArrayObj::new(TypeRef::parse(elem)))));
            }
            OpCode::LdElem => {
                let index = coerce::to_i64(&frame.pop()?)?;
                let arr = pop_array(frame)?;
                frame.push(arr.get(index));
            }
            OpCode::StElem => {
                let v = frame.pop()?;
                let index = coerce::to_i64(&frame.pop()?)?;
                let arr = pop_array(frame)?;
                if index < 0 {
                    return Err(Raised::from(IrError::new(
                        ErrorKind::TypeMismatch,
                        format!("Negative array index: {}", index),
                    )));
                }
                arr.set(index as usize, v);
            }
            OpCode::LdLen => {
                let arr = pop_array(frame)?;
                frame.push(Value::Int32(arr.len() as i32));
            }

            OpCode::CastClass => {
                let target = operand_type_name(instr)?;
                let v = frame.pop()?;
                if v.is_null() || self.value_matches_type(&v, target) {
                    frame.push(v);
                } else {
                    return Err(Raised::from(IrError::new(
                        ErrorKind::TypeMismatch,
                        format!("Cannot cast {} to {}", v.type_name(), target),
                    )));
                }
            }
            OpCode::IsInst => {
                let target = operand_type_name(instr)?;
                let v = frame.pop()?;
                frame.push(Value::Bool(!v.is_null() && self.value_matches_type(&v, target)));
            }
            OpCode::Conv => {
                let target = operand_type_name(instr)?;
                let v = frame.pop()?;
                frame.push(coerce::convert_to(&v, target)?);
            }

            OpCode::Call => {
                let target = operand_call(instr)?;
                self.exec_call(target, false, frame)?;
            }
            OpCode::CallVirt => {
                let target = operand_call(instr)?;
                self.exec_call(target, true, frame)?;
            }
            OpCode::Ret => return Ok(BlockExit::Return),

            OpCode::If => {
                let data = match &instr.operand {
                    Operand::If(data) => data,
                    _ => return Err(malformed(instr, "if metadata")),
                };
                let cond = self.eval_condition(&data.condition, frame)?;
                let block = if cond { &data.then_block } else { &data.else_block };
                return self.exec_block(block, frame);
            }
            OpCode::While => {
                let data = match &instr.operand {
                    Operand::While(data) => data,
                    _ => return Err(malformed(instr, "while metadata")),
                };
                loop {
                    if !self.eval_condition(&data.condition, frame)? {
                        break;
                    }
                    match self.exec_block(&data.body, frame)? {
                        BlockExit::Normal | BlockExit::Continue => {}
                        BlockExit::Break => break,
                        BlockExit::Return => return Ok(BlockExit::Return),
                    }
                }
            }
            OpCode::Break => return Ok(BlockExit::Break),
            OpCode::Continue => return Ok(BlockExit::Continue),

            OpCode::Try => {
                let data = match &instr.operand {
                    Operand::Try(data) => data,
                    _ => return Err(malformed(instr, "try metadata")),
                };
                return self.exec_try(data, frame);
            }
            OpCode::Throw => {
                let v = frame.pop()?;
                let message = match &v {
                    Value::Object(obj) => self.classes.class(obj.borrow().class).qualified.clone(),
                    other => other.to_string(),
                };
                return Err(Raised {
                    error: IrError::new(ErrorKind::Host, message),
                    value: Some(v),
                });
            }

            // Branches are resolved by the frame loop; reaching here means
            // one was nested inside a block.
            OpCode::Br
            | OpCode::BrTrue
            | OpCode::BrFalse
            | OpCode::Beq
            | OpCode::Bne
            | OpCode::Bgt
            | OpCode::Bge
            | OpCode::Blt
            | OpCode::Ble => {
                return Err(Raised::from(IrError::new(
                    ErrorKind::MalformedOperand,
                    "Branch opcodes are only valid at method level",
                )));
            }
        }
        Ok(BlockExit::Normal)
    }

    /// Instance selection for `ldfld`/`stfld`: an object on top of the
    /// stack is consumed; any other top value is left alone and the
    /// frame's `this` is used.
    fn field_instance(&mut self, frame: &mut Frame, storing: bool) -> Exec<ObjectRef> {
        if let Some(Value::Object(_)) = frame.stack.last() {
            if let Value::Object(obj) = frame.pop()? {
                return Ok(obj);
            }
        }
        frame.this.clone().ok_or_else(|| {
            Raised::from(IrError::new(
                ErrorKind::TypeMismatch,
                format!(
                    "{} requires an object instance on the stack or a valid 'this'",
                    if storing { "StFld" } else { "LdFld" }
                ),
            ))
        })
    }

    fn static_key(&self, declaring_type: &str, name: &str) -> Exec<(String, String)> {
        let id = self.classes.get(declaring_type)?;
        if !self.classes.has_static_field(id, name) {
            return Err(Raised::from(IrError::new(
                ErrorKind::NotFound,
                format!("Static field not found: {}.{}", declaring_type, name),
            )));
        }
        Ok((self.classes.class(id).qualified.clone(), name.to_string()))
    }

    fn load_static(&mut self, declaring_type: &str, name: &str) -> Exec<Value> {
        let key = self.static_key(declaring_type, name)?;
        Ok(self.statics.get(&key).cloned().unwrap_or(Value::Null))
    }

    fn store_static(&mut self, declaring_type: &str, name: &str, value: Value) -> Exec<()> {
        let key = self.static_key(declaring_type, name)?;
        self.statics.insert(key, value);
        Ok(())
    }

    fn value_matches_type(&self, v: &Value, target: &str) -> bool {
        let target = normalize_type_name(target);
        if target == "object" {
            return true;
        }
        match v {
            Value::Object(obj) => self.classes.is_instance_of(obj.borrow().class, &target),
            _ => v.type_name() == target,
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

// --- operand accessors; a missing or ill-typed payload is a malformed
// --- operand, reported with the opcode's name.

fn malformed(instr: &Instruction, what: &str) -> Raised {
    Raised::from(IrError::new(
        ErrorKind::MalformedOperand,
        format!("{} instruction missing {} operand", instr.op, what),
    ))
}

fn operand_name(instr: &Instruction) -> Exec<&str> {
    match &instr.operand {
        Operand::Name(name) if !name.is_empty() => Ok(name),
        _ => Err(malformed(instr, "name")),
    }
}

fn operand_int(instr: &Instruction) -> Exec<i64> {
    match &instr.operand {
        Operand::Int(i) => Ok(*i),
        Operand::Float(x) => Ok(x.trunc() as i64),
        _ => Err(malformed(instr, "numeric")),
    }
}

fn operand_float(instr: &Instruction) -> Exec<f64> {
    match &instr.operand {
        Operand::Float(x) => Ok(*x),
        Operand::Int(i) => Ok(*i as f64),
        _ => Err(malformed(instr, "numeric")),
    }
}

fn operand_type_name(instr: &Instruction) -> Exec<&str> {
    match &instr.operand {
        Operand::TypeName(name) if !name.is_empty() => Ok(name),
        _ => Err(malformed(instr, "type")),
    }
}

fn operand_call(instr: &Instruction) -> Exec<&CallTarget> {
    match &instr.operand {
        Operand::Call(target) => Ok(target),
        _ => Err(malformed(instr, "call target")),
    }
}

fn operand_field_name(instr: &Instruction) -> Exec<&str> {
    match &instr.operand {
        Operand::Field(field) if !field.name.is_empty() => Ok(&field.name),
        Operand::Name(name) if !name.is_empty() => Ok(name),
        _ => Err(malformed(instr, "field")),
    }
}

fn operand_static_field(instr: &Instruction) -> Exec<(&str, &str)> {
    match &instr.operand {
        Operand::StaticField { declaring_type, name } if !name.is_empty() => {
            Ok((declaring_type, name))
        }
        _ => Err(malformed(instr, "static field")),
    }
}

fn constant_value(instr: &Instruction) -> Exec<Value> {
    let (value, ty, is_null) = match &instr.operand {
        Operand::Const { value, ty, is_null } => (value, ty, *is_null),
        _ => return Err(malformed(instr, "constant")),
    };
    if is_null {
        return Ok(Value::Null);
    }

    let parse_err = |what: &str| {
        Raised::from(IrError::new(
            ErrorKind::MalformedOperand,
            format!("Invalid {} constant: {}", what, value),
        ))
    };

    match normalize_type_name(ty).as_str() {
        "" | "string" | "char" => Ok(Value::Str(value.clone())),
        "bool" => Ok(Value::Bool(matches!(value.to_ascii_lowercase().as_str(), "true" | "1"))),
        "int8" | "int16" | "int32" | "uint8" | "uint16" => {
            Ok(Value::Int32(value.trim().parse().map_err(|_| parse_err("int32"))?))
        }
        "int64" | "uint32" | "uint64" => {
            Ok(Value::Int64(value.trim().parse().map_err(|_| parse_err("int64"))?))
        }
        "float32" => Ok(Value::Float32(value.trim().parse().map_err(|_| parse_err("float32"))?)),
        "float64" => Ok(Value::Float64(value.trim().parse().map_err(|_| parse_err("float64"))?)),
        _ => Ok(Value::Str(value.clone())),
    }
}

fn pop_array(frame: &mut Frame) -> Exec<objectir_ir::ArrayRef> {
    match frame.pop()? {
        Value::Array(arr) => Ok(arr),
        other => Err(Raised::from(IrError::new(
            ErrorKind::TypeMismatch,
            format!("Array operation on non-array value ({})", other.type_name()),
        ))),
    }
}
