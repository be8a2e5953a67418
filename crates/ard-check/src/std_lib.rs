//! Signatures of the standard-library packages (`ard/...`).
//!
//! The checker only needs each function's signature and how it lowers; the
//! behaviour lives in the VM's module handlers. The network and database
//! packages are recognized so imports of them check, but expose no functions.

use crate::types::{FunctionDef, ParamDef, Type};
use indexmap::IndexMap;

/// How a std function call is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdLowering {
    /// Dispatch to the module handler by name.
    Module { fallible: bool },
    MakeSome,
    MakeNone,
    MakeOk,
    MakeErr,
    StartFiber,
}

#[derive(Debug, Clone)]
pub struct StdFunction {
    pub sig: FunctionDef,
    pub lowering: StdLowering,
}

#[derive(Debug, Clone)]
pub struct StdPackage {
    /// Import path, e.g. `ard/io`
    pub path: &'static str,
    /// Module name used by the VM handler registry
    pub module: &'static str,
    pub functions: IndexMap<&'static str, StdFunction>,
}

impl StdPackage {
    fn new(path: &'static str, module: &'static str) -> Self {
        Self {
            path,
            module,
            functions: IndexMap::new(),
        }
    }

    fn function(mut self, name: &'static str, params: &[Type], ret: Type) -> Self {
        self.functions
            .insert(name, sig(name, params, ret, StdLowering::Module { fallible: false }));
        self
    }

    /// The declared return type becomes `ret!Str`; handler errors become `err`.
    fn fallible(mut self, name: &'static str, params: &[Type], ret: Type) -> Self {
        let ret = Type::result(ret, Type::Str);
        self.functions
            .insert(name, sig(name, params, ret, StdLowering::Module { fallible: true }));
        self
    }

    fn special(mut self, name: &'static str, params: &[Type], ret: Type, lowering: StdLowering) -> Self {
        self.functions.insert(name, sig(name, params, ret, lowering));
        self
    }

    pub fn get(&self, name: &str) -> Option<&StdFunction> {
        self.functions.get(name)
    }
}

fn sig(name: &str, params: &[Type], ret: Type, lowering: StdLowering) -> StdFunction {
    let params = params
        .iter()
        .enumerate()
        .map(|(i, ty)| ParamDef {
            name: format!("arg{i}"),
            ty: ty.clone(),
            mutable: false,
        })
        .collect();
    StdFunction {
        sig: FunctionDef::new(name, params, ret),
        lowering,
    }
}

fn generic(name: &str) -> Type {
    Type::Generic(name.to_string())
}

/// Every recognized std import path.
pub const STD_PATHS: &[&str] = &[
    "ard/io",
    "ard/fs",
    "ard/http",
    "ard/json",
    "ard/sqlite",
    "ard/maybe",
    "ard/float",
    "ard/int",
    "ard/result",
    "ard/async",
];

/// Look up a std package by import path.
pub fn std_package(path: &str) -> Option<StdPackage> {
    let package = match path {
        "ard/io" => StdPackage::new("ard/io", "io")
            .function("print", &[Type::Str], Type::Void)
            .fallible("read_line", &[], Type::Str),
        "ard/fs" => StdPackage::new("ard/fs", "fs")
            .fallible("read", &[Type::Str], Type::Str)
            .fallible("write", &[Type::Str, Type::Str], Type::Void)
            .function("exists", &[Type::Str], Type::Bool)
            .fallible("delete", &[Type::Str], Type::Void),
        "ard/http" => StdPackage::new("ard/http", "http"),
        "ard/json" => StdPackage::new("ard/json", "json"),
        "ard/sqlite" => StdPackage::new("ard/sqlite", "sqlite"),
        "ard/maybe" => StdPackage::new("ard/maybe", "maybe")
            .special("some", &[generic("T")], Type::maybe(generic("T")), StdLowering::MakeSome)
            .special("none", &[], Type::maybe(generic("T")), StdLowering::MakeNone),
        "ard/float" => StdPackage::new("ard/float", "float")
            .function("from_int", &[Type::Int], Type::Float)
            .function("from_str", &[Type::Str], Type::maybe(Type::Float))
            .function("to_int", &[Type::Float], Type::Int)
            .function("floor", &[Type::Float], Type::Float),
        "ard/int" => StdPackage::new("ard/int", "int")
            .function("from_str", &[Type::Str], Type::maybe(Type::Int))
            .function("to_float", &[Type::Int], Type::Float),
        "ard/result" => StdPackage::new("ard/result", "result")
            .special(
                "ok",
                &[generic("T")],
                Type::result(generic("T"), generic("E")),
                StdLowering::MakeOk,
            )
            .special(
                "err",
                &[generic("E")],
                Type::result(generic("T"), generic("E")),
                StdLowering::MakeErr,
            ),
        "ard/async" => StdPackage::new("ard/async", "async")
            .special(
                "start",
                &[Type::function(vec![], generic("T"))],
                Type::Fiber(Box::new(generic("T"))),
                StdLowering::StartFiber,
            )
            .function("sleep", &[Type::Int], Type::Void),
        _ => return None,
    };
    Some(package)
}
