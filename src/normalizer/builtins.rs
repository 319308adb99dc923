//! The fixed set of names that ship with the source-language runtime.
//! These are never renamed; the list mirrors `dir(builtins)` of a recent
//! CPython, minus keyword constants the parser already treats as literals.

use std::collections::HashSet;
use std::sync::OnceLock;

static BUILTINS: OnceLock<HashSet<&'static str>> = OnceLock::new();

const BUILTIN_NAMES: &[&str] = &[
    // functions and types
    "abs", "aiter", "anext", "all", "any", "ascii", "bin", "bool", "bytearray",
    "bytes", "callable", "chr", "classmethod", "compile", "complex", "delattr",
    "dict", "dir", "divmod", "enumerate", "eval", "exec", "filter", "float",
    "format", "frozenset", "getattr", "globals", "hasattr", "hash", "help",
    "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len",
    "list", "locals", "map", "max", "memoryview", "min", "next", "object",
    "oct", "open", "ord", "pow", "print", "property", "range", "repr",
    "reversed", "round", "set", "setattr", "slice", "sorted", "staticmethod",
    "str", "sum", "super", "tuple", "type", "vars", "zip", "__import__",
    // exceptions
    "ArithmeticError", "AssertionError", "AttributeError", "BaseException",
    "BaseExceptionGroup", "BlockingIOError", "BrokenPipeError", "BufferError",
    "BytesWarning", "ChildProcessError", "ConnectionAbortedError",
    "ConnectionError", "ConnectionRefusedError", "ConnectionResetError",
    "DeprecationWarning", "EOFError", "EnvironmentError", "Exception",
    "ExceptionGroup", "FileExistsError", "FileNotFoundError",
    "FloatingPointError", "FutureWarning", "GeneratorExit", "IOError",
    "ImportError", "ImportWarning", "IndentationError", "IndexError",
    "InterruptedError", "IsADirectoryError", "KeyError", "KeyboardInterrupt",
    "LookupError", "MemoryError", "ModuleNotFoundError", "NameError",
    "NotADirectoryError", "NotImplementedError", "OSError", "OverflowError",
    "PendingDeprecationWarning", "PermissionError", "ProcessLookupError",
    "RecursionError", "ReferenceError", "ResourceWarning", "RuntimeError",
    "RuntimeWarning", "StopAsyncIteration", "StopIteration", "SyntaxError",
    "SyntaxWarning", "SystemError", "SystemExit", "TabError", "TimeoutError",
    "TypeError", "UnboundLocalError", "UnicodeDecodeError",
    "UnicodeEncodeError", "UnicodeError", "UnicodeTranslateError",
    "UnicodeWarning", "UserWarning", "ValueError", "Warning",
    "ZeroDivisionError",
    // singletons and module-level dunders
    "Ellipsis", "NotImplemented", "__build_class__", "__debug__", "__doc__",
    "__loader__", "__name__", "__package__", "__spec__",
];

/// True if `name` belongs to the source-language builtin set.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS
        .get_or_init(|| BUILTIN_NAMES.iter().copied().collect())
        .contains(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_builtins_recognized() {
        for name in ["len", "sum", "print", "range", "ValueError"] {
            assert!(is_builtin(name), "{name} should be a builtin");
        }
    }

    #[test]
    fn test_user_names_are_not_builtins() {
        for name in ["total", "somme", "données", "_fnpool_v_0"] {
            assert!(!is_builtin(name), "{name} should not be a builtin");
        }
    }
}
