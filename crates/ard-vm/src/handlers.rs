//! Opcode handlers.
//!
//! One function per opcode, collected into a table indexed by
//! [`OpcodeKind`]. Handlers decode their operands, move values between the
//! operand stack and frame locals, and report faults as [`RuntimeError`].

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use ard_bytecode::opcode::{Instruction, OpcodeKind};
use ard_bytecode::operand::{operand_count, operand_flag, operand_function, operand_slot, operand_target};
use ard_bytecode::registry::OPCODE_COUNT;

use crate::error::RuntimeError;
use crate::executor::Machine;
use crate::host::HostError;
use crate::value::{Closure, MapKey, StructValue, Value};

/// Executes one instruction against a machine.
pub(crate) type Handler = fn(&Instruction, &mut Machine) -> Result<(), RuntimeError>;

const HANDLERS: &[(OpcodeKind, Handler)] = &[
    (OpcodeKind::Const, exec_const),
    (OpcodeKind::Load, exec_load),
    (OpcodeKind::Store, exec_store),
    (OpcodeKind::Pop, exec_pop),
    (OpcodeKind::Add, exec_add),
    (OpcodeKind::Sub, exec_sub),
    (OpcodeKind::Mul, exec_mul),
    (OpcodeKind::Div, exec_div),
    (OpcodeKind::Mod, exec_mod),
    (OpcodeKind::Neg, exec_neg),
    (OpcodeKind::Not, exec_not),
    (OpcodeKind::Eq, exec_eq),
    (OpcodeKind::NotEq, exec_not_eq),
    (OpcodeKind::Lt, exec_lt),
    (OpcodeKind::LtEq, exec_lt_eq),
    (OpcodeKind::Gt, exec_gt),
    (OpcodeKind::GtEq, exec_gt_eq),
    (OpcodeKind::Jump, exec_jump),
    (OpcodeKind::JumpIfFalse, exec_jump_if_false),
    (OpcodeKind::Call, exec_call),
    (OpcodeKind::CallValue, exec_call_value),
    (OpcodeKind::Return, exec_return),
    (OpcodeKind::MakeList, exec_make_list),
    (OpcodeKind::MakeMap, exec_make_map),
    (OpcodeKind::MakeStruct, exec_make_struct),
    (OpcodeKind::MakeClosure, exec_make_closure),
    (OpcodeKind::MakeSome, exec_make_some),
    (OpcodeKind::MakeNone, exec_make_none),
    (OpcodeKind::MakeOk, exec_make_ok),
    (OpcodeKind::MakeErr, exec_make_err),
    (OpcodeKind::GetField, exec_get_field),
    (OpcodeKind::SetField, exec_set_field),
    (OpcodeKind::ListPush, exec_list_push),
    (OpcodeKind::ListAt, exec_list_at),
    (OpcodeKind::MapSet, exec_map_set),
    (OpcodeKind::MapGet, exec_map_get),
    (OpcodeKind::MapHas, exec_map_has),
    (OpcodeKind::Size, exec_size),
    (OpcodeKind::ToStr, exec_to_str),
    (OpcodeKind::IsSome, exec_is_some),
    (OpcodeKind::IsNone, exec_is_none),
    (OpcodeKind::IsOk, exec_is_ok),
    (OpcodeKind::IsErr, exec_is_err),
    (OpcodeKind::MaybeOr, exec_maybe_or),
    (OpcodeKind::Unwrap, exec_unwrap),
    (OpcodeKind::IsType, exec_is_type),
    (OpcodeKind::ModuleCall, exec_module_call),
    (OpcodeKind::CallExtern, exec_call_extern),
    (OpcodeKind::StartFiber, exec_start_fiber),
    (OpcodeKind::Wait, exec_wait),
];

fn handler_table() -> &'static [Option<Handler>; OPCODE_COUNT] {
    static TABLE: OnceLock<[Option<Handler>; OPCODE_COUNT]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: [Option<Handler>; OPCODE_COUNT] = [None; OPCODE_COUNT];
        for (kind, handler) in HANDLERS {
            if let Some(slot) = table.get_mut(*kind as usize) {
                *slot = Some(*handler);
            }
        }
        table
    })
}

/// Look up the handler for an opcode.
pub(crate) fn handler_for(kind: OpcodeKind) -> Option<Handler> {
    handler_table().get(kind as usize).copied().flatten()
}

// === Stack ===

fn exec_const(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let value = machine.constant(instruction, 0)?;
    machine.push(value)
}

fn exec_load(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let slot = operand_slot(&instruction.operands, 0)?;
    let value = machine.local(slot.id() as usize)?;
    machine.push(value)
}

fn exec_store(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let slot = operand_slot(&instruction.operands, 0)?;
    let value = machine.pop()?;
    machine.set_local(slot.id() as usize, value)
}

fn exec_pop(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    machine.pop().map(drop)
}

// === Arithmetic ===

fn pop_pair(machine: &mut Machine) -> Result<(Value, Value), RuntimeError> {
    let right = machine.pop()?;
    let left = machine.pop()?;
    Ok((left, right))
}

/// Shared shape of the numeric operators: checked on Int, IEEE on Float.
fn arithmetic(
    (left, right): (Value, Value),
    operation: &'static str,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int(a, b)
            .map(Value::Int)
            .ok_or(RuntimeError::IntegerOverflow { operation }),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float(a, b))),
        (Value::Int(_) | Value::Float(_), other) => {
            Err(RuntimeError::mismatch(operation, "matching number", &other))
        }
        (other, _) => Err(RuntimeError::mismatch(operation, "Int or Float", &other)),
    }
}

fn exec_add(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let result = match pop_pair(machine)? {
        (Value::Str(mut a), Value::Str(b)) => {
            a.push_str(&b);
            Value::Str(a)
        }
        pair => arithmetic(pair, "add", i64::checked_add, |a, b| a + b)?,
    };
    machine.push(result)
}

fn exec_sub(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let result = arithmetic(pop_pair(machine)?, "sub", i64::checked_sub, |a, b| a - b)?;
    machine.push(result)
}

fn exec_mul(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let result = arithmetic(pop_pair(machine)?, "mul", i64::checked_mul, |a, b| a * b)?;
    machine.push(result)
}

/// Integer division and remainder fault on a zero divisor; floats follow IEEE.
fn divide(
    machine: &mut Machine,
    operation: &'static str,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Result<(), RuntimeError> {
    let pair = pop_pair(machine)?;
    if let (Value::Int(_), Value::Int(0)) = pair {
        return Err(RuntimeError::DivisionByZero);
    }
    let result = arithmetic(pair, operation, int, float)?;
    machine.push(result)
}

fn exec_div(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    divide(machine, "div", i64::checked_div, |a, b| a / b)
}

fn exec_mod(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    divide(machine, "mod", i64::checked_rem, |a, b| a % b)
}

fn exec_neg(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let result = match machine.pop()? {
        Value::Int(value) => Value::Int(
            value
                .checked_neg()
                .ok_or(RuntimeError::IntegerOverflow { operation: "neg" })?,
        ),
        Value::Float(value) => Value::Float(-value),
        other => return Err(RuntimeError::mismatch("neg", "Int or Float", &other)),
    };
    machine.push(result)
}

fn exec_not(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let value = pop_bool(machine, "not")?;
    machine.push(Value::Bool(!value))
}

fn exec_eq(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let (left, right) = pop_pair(machine)?;
    machine.push(Value::Bool(left == right))
}

fn exec_not_eq(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let (left, right) = pop_pair(machine)?;
    machine.push(Value::Bool(left != right))
}

fn compare(
    machine: &mut Machine,
    operation: &'static str,
    test: fn(std::cmp::Ordering) -> bool,
) -> Result<(), RuntimeError> {
    let ordering = match pop_pair(machine)? {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(&b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(&b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(&b)),
        (left, _) => return Err(RuntimeError::mismatch(operation, "Int, Float or Str", &left)),
    };
    // NaN compares false both ways.
    machine.push(Value::Bool(ordering.is_some_and(test)))
}

fn exec_lt(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    compare(machine, "lt", |o| o.is_lt())
}

fn exec_lt_eq(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    compare(machine, "lt_eq", |o| o.is_le())
}

fn exec_gt(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    compare(machine, "gt", |o| o.is_gt())
}

fn exec_gt_eq(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    compare(machine, "gt_eq", |o| o.is_ge())
}

// === Control ===

fn exec_jump(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let target = operand_target(&instruction.operands, 0)?;
    machine.jump(target)
}

fn exec_jump_if_false(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let target = operand_target(&instruction.operands, 0)?;
    if !pop_bool(machine, "branch")? {
        machine.jump(target)?;
    }
    Ok(())
}

fn exec_call(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let function = operand_function(&instruction.operands, 0)?;
    machine.call_indexed(function)
}

fn exec_call_value(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let count = operand_count(&instruction.operands, 0)?;
    let args = machine.pop_n(count)?;
    match machine.pop()? {
        Value::Closure(closure) => machine.call_value(&closure, args),
        other => Err(RuntimeError::mismatch("call", "Function", &other)),
    }
}

fn exec_return(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    machine.leave()
}

// === Constructors ===

fn exec_make_list(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let count = operand_count(&instruction.operands, 0)?;
    let items = machine.pop_n(count)?;
    machine.push(Value::List(items))
}

fn exec_make_map(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let count = operand_count(&instruction.operands, 0)?;
    let flat = machine.pop_n(count * 2)?;
    let mut entries = IndexMap::with_capacity(count);
    let mut values = flat.into_iter();
    while let (Some(key), Some(value)) = (values.next(), values.next()) {
        entries.insert(MapKey(key), value);
    }
    machine.push(Value::Map(entries))
}

fn exec_make_struct(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let name = machine.name(instruction, 0)?;
    let count = operand_count(&instruction.operands, 1)?;
    let fields = machine.pop_n(count)?;
    machine.push(Value::Struct(Box::new(StructValue { name, fields })))
}

fn exec_make_closure(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let function = operand_function(&instruction.operands, 0)?;
    let count = operand_count(&instruction.operands, 1)?;
    let captures = machine.pop_n(count)?;
    machine.push(Value::Closure(Arc::new(Closure {
        function: function as u32,
        captures,
    })))
}

fn exec_make_some(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let value = machine.pop()?;
    machine.push(Value::some(value))
}

fn exec_make_none(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    machine.push(Value::none())
}

fn exec_make_ok(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let value = machine.pop()?;
    machine.push(Value::ok(value))
}

fn exec_make_err(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let value = machine.pop()?;
    machine.push(Value::err(value))
}

// === Aggregates ===

fn exec_get_field(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let index = operand_count(&instruction.operands, 0)?;
    let value = match machine.pop()? {
        Value::Struct(mut value) if index < value.fields.len() => value.fields.swap_remove(index),
        Value::Struct(value) => {
            return Err(RuntimeError::IndexOutOfRange {
                index: index as i64,
                size: value.fields.len(),
            });
        }
        other => return Err(RuntimeError::mismatch("field access", "Struct", &other)),
    };
    machine.push(value)
}

fn exec_set_field(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let index = operand_count(&instruction.operands, 0)?;
    let (target, value) = pop_pair(machine)?;
    let Value::Struct(mut target) = target else {
        return Err(RuntimeError::mismatch("field assignment", "Struct", &target));
    };
    let size = target.fields.len();
    let field = target.fields.get_mut(index).ok_or(RuntimeError::IndexOutOfRange {
        index: index as i64,
        size,
    })?;
    *field = value;
    machine.push(Value::Struct(target))
}

fn exec_list_push(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let (list, value) = pop_pair(machine)?;
    let Value::List(mut items) = list else {
        return Err(RuntimeError::mismatch("push", "List", &list));
    };
    items.push(value);
    machine.push(Value::List(items))
}

fn exec_list_at(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let (list, index) = pop_pair(machine)?;
    let Value::List(mut items) = list else {
        return Err(RuntimeError::mismatch("at", "List", &list));
    };
    let Value::Int(index) = index else {
        return Err(RuntimeError::mismatch("at", "Int", &index));
    };
    let size = items.len();
    let at = usize::try_from(index)
        .ok()
        .filter(|at| *at < size)
        .ok_or(RuntimeError::IndexOutOfRange { index, size })?;
    machine.push(items.swap_remove(at))
}

fn pop_map(machine: &mut Machine, operation: &'static str) -> Result<IndexMap<MapKey, Value>, RuntimeError> {
    match machine.pop()? {
        Value::Map(entries) => Ok(entries),
        other => Err(RuntimeError::mismatch(operation, "Map", &other)),
    }
}

fn exec_map_set(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let (key, value) = pop_pair(machine)?;
    let mut entries = pop_map(machine, "set")?;
    // An existing key keeps its position.
    entries.insert(MapKey(key), value);
    machine.push(Value::Map(entries))
}

fn exec_map_get(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let key = machine.pop()?;
    let mut entries = pop_map(machine, "get")?;
    let found = entries.swap_remove(&MapKey(key));
    machine.push(Value::Maybe(found.map(Box::new)))
}

fn exec_map_has(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let key = machine.pop()?;
    let entries = pop_map(machine, "has")?;
    machine.push(Value::Bool(entries.contains_key(&MapKey(key))))
}

fn exec_size(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let size = match machine.pop()? {
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        Value::Str(text) => text.chars().count(),
        other => return Err(RuntimeError::mismatch("size", "List, Map or Str", &other)),
    };
    machine.push(Value::Int(size as i64))
}

fn exec_to_str(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let value = machine.pop()?;
    let text = match value {
        Value::Str(text) => text,
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => value.to_string(),
        other => return Err(RuntimeError::mismatch("to_str", "Int, Float, Str or Bool", &other)),
    };
    machine.push(Value::Str(text))
}

// === Maybe and Result ===

fn pop_bool(machine: &mut Machine, operation: &'static str) -> Result<bool, RuntimeError> {
    match machine.pop()? {
        Value::Bool(value) => Ok(value),
        other => Err(RuntimeError::mismatch(operation, "Bool", &other)),
    }
}

fn maybe_test(machine: &mut Machine, want_some: bool) -> Result<(), RuntimeError> {
    match machine.pop()? {
        Value::Maybe(inner) => machine.push(Value::Bool(inner.is_some() == want_some)),
        other => Err(RuntimeError::mismatch("maybe test", "Maybe", &other)),
    }
}

fn result_test(machine: &mut Machine, want_ok: bool) -> Result<(), RuntimeError> {
    match machine.pop()? {
        Value::Result(inner) => machine.push(Value::Bool(inner.is_ok() == want_ok)),
        other => Err(RuntimeError::mismatch("result test", "Result", &other)),
    }
}

fn exec_is_some(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    maybe_test(machine, true)
}

fn exec_is_none(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    maybe_test(machine, false)
}

fn exec_is_ok(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    result_test(machine, true)
}

fn exec_is_err(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    result_test(machine, false)
}

fn exec_maybe_or(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let (maybe, default) = pop_pair(machine)?;
    let value = match maybe {
        Value::Maybe(Some(inner)) => *inner,
        Value::Maybe(None) => default,
        other => return Err(RuntimeError::mismatch("or", "Maybe", &other)),
    };
    machine.push(value)
}

fn exec_unwrap(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let value = match machine.pop()? {
        Value::Maybe(Some(inner)) | Value::Result(Ok(inner)) | Value::Result(Err(inner)) => *inner,
        Value::Maybe(None) => return Err(RuntimeError::UnwrapNone),
        other => return Err(RuntimeError::mismatch("unwrap", "Maybe or Result", &other)),
    };
    machine.push(value)
}

fn exec_is_type(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let tag = machine.name(instruction, 0)?;
    let value = machine.pop()?;
    machine.push(Value::Bool(value.tag() == Some(tag.as_str())))
}

// === Host ===

fn exec_module_call(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let module = machine.name(instruction, 0)?;
    let function = machine.name(instruction, 1)?;
    let count = operand_count(&instruction.operands, 2)?;
    let returns = operand_flag(&instruction.operands, 3)?;
    let fallible = operand_flag(&instruction.operands, 4)?;
    let args = machine.pop_n(count)?;

    let outcome = machine
        .host()
        .call_module(&module, &function, args)
        .ok_or_else(|| RuntimeError::UnknownModule { module: module.clone() })?;
    let value = match outcome {
        Ok(value) if fallible => Value::ok(value),
        Ok(value) => value,
        Err(HostError::Failed(message)) if fallible => Value::err(Value::Str(message)),
        Err(HostError::UnknownFunction(_)) => {
            return Err(RuntimeError::UnknownModuleFunction { module, function });
        }
        Err(err) => {
            return Err(RuntimeError::Host {
                context: format!("{module}::{function}"),
                message: err.to_string(),
            });
        }
    };
    if returns {
        machine.push(value)?;
    }
    Ok(())
}

fn exec_call_extern(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let name = machine.name(instruction, 0)?;
    let count = operand_count(&instruction.operands, 1)?;
    let returns = operand_flag(&instruction.operands, 2)?;
    let args = machine.pop_n(count)?;

    let value = machine
        .host()
        .call_foreign(&name, args)
        .ok_or_else(|| RuntimeError::UnknownForeign { name: name.clone() })?
        .map_err(|err| RuntimeError::Host {
            context: format!("extern `{name}`"),
            message: err.to_string(),
        })?;
    if returns {
        machine.push(value)?;
    }
    Ok(())
}

fn exec_start_fiber(_instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let closure = match machine.pop()? {
        Value::Closure(closure) => closure,
        other => return Err(RuntimeError::mismatch("async::start", "Function", &other)),
    };
    let fiber = machine.spawn_fiber(closure)?;
    machine.push(Value::Fiber(fiber))
}

fn exec_wait(instruction: &Instruction, machine: &mut Machine) -> Result<(), RuntimeError> {
    let returns = operand_flag(&instruction.operands, 0)?;
    let fiber = match machine.pop()? {
        Value::Fiber(fiber) => fiber,
        other => return Err(RuntimeError::mismatch("wait", "Fiber", &other)),
    };
    let value = fiber
        .wait()
        .map_err(|message| RuntimeError::FiberFailed { message })?;
    if returns {
        machine.push(value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ard_bytecode::registry::opcode_specs;

    #[test]
    fn test_every_opcode_has_a_handler() {
        for spec in opcode_specs() {
            assert!(handler_for(spec.kind).is_some(), "{:?} has no handler", spec.kind);
        }
        assert_eq!(HANDLERS.len(), OPCODE_COUNT);
    }

    #[test]
    fn test_handler_kinds_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for (kind, _) in HANDLERS {
            assert!(seen.insert(*kind as usize), "{kind:?} registered twice");
        }
    }
}
