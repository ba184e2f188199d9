use hb_core::{
    ScriptDiagnostic, ScriptExecutionError, SCRIPT_BUDGET_EXCEEDED, SCRIPT_RUNTIME_ERROR,
    SCRIPT_TIMEOUT,
};
use rhai::{Dynamic, EvalAltResult, Map, Position};

pub(crate) type GuestResult<T> = Result<T, Box<EvalAltResult>>;

/// A catchable guest exception carrying `message`.
pub(crate) fn guest_error(message: impl Into<String>) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(message.into()),
        Position::NONE,
    ))
}

/// Strips the function-call and module wrappers rhai adds while unwinding.
pub(crate) fn root_cause(error: &EvalAltResult) -> &EvalAltResult {
    let mut current = error;
    loop {
        match current {
            EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
            | EvalAltResult::ErrorInModule(_, inner, _) => current = inner,
            _ => return current,
        }
    }
}

/// Errors that end the invocation no matter who observes them: the sandbox
/// budget and the wall-clock deadline.
pub(crate) fn is_fatal(error: &EvalAltResult) -> bool {
    matches!(
        root_cause(error),
        EvalAltResult::ErrorTerminated(..)
            | EvalAltResult::ErrorTooManyOperations(..)
            | EvalAltResult::ErrorStackOverflow(..)
            | EvalAltResult::ErrorDataTooLarge(..)
    )
}

/// Constructor name and message of a thrown value, as `try/catch` and
/// `throws` assertions see them. Error maps built by `Error(..)` and friends
/// keep their name; anything else reports as a plain `Error`.
pub(crate) fn thrown_error_parts(error: &EvalAltResult) -> (String, String) {
    match root_cause(error) {
        EvalAltResult::ErrorRuntime(value, _) => value_error_parts(value),
        other => ("Error".to_string(), other.to_string()),
    }
}

fn value_error_parts(value: &Dynamic) -> (String, String) {
    let value = value.flatten_clone();
    if let Some(map) = value.read_lock::<Map>() {
        let field = |key: &str| {
            map.get(key)
                .map(|item| item.to_string())
                .filter(|text| !text.is_empty())
        };
        if let Some(message) = field("message") {
            return (field("name").unwrap_or_else(|| "Error".to_string()), message);
        }
    }
    ("Error".to_string(), value.to_string())
}

/// Maps a guest failure to the invocation's error surface.
pub(crate) fn to_execution_error(
    error: &EvalAltResult,
    test: Option<&str>,
) -> ScriptExecutionError {
    let cause = root_cause(error);
    let (code, message) = match cause {
        EvalAltResult::ErrorTerminated(..) => (
            SCRIPT_TIMEOUT,
            "Script exceeded its execution time limit".to_string(),
        ),
        EvalAltResult::ErrorTooManyOperations(..) => (
            SCRIPT_BUDGET_EXCEEDED,
            "Script exceeded its operation budget".to_string(),
        ),
        EvalAltResult::ErrorStackOverflow(..) => (
            SCRIPT_BUDGET_EXCEEDED,
            "Script exceeded its call depth limit".to_string(),
        ),
        EvalAltResult::ErrorDataTooLarge(what, _) => (
            SCRIPT_BUDGET_EXCEEDED,
            format!("{what} exceeds the sandbox size limit"),
        ),
        EvalAltResult::ErrorRuntime(value, _) => {
            let (name, message) = value_error_parts(value);
            let is_error_map = value
                .flatten_clone()
                .read_lock::<Map>()
                .is_some_and(|map| map.contains_key("message"));
            let message = if is_error_map {
                format!("{name}: {message}")
            } else {
                message
            };
            (SCRIPT_RUNTIME_ERROR, message)
        }
        other => (SCRIPT_RUNTIME_ERROR, other.to_string()),
    };

    let position = if cause.position().is_none() {
        error.position()
    } else {
        cause.position()
    };
    ScriptExecutionError::with_diagnostic(
        code,
        message,
        ScriptDiagnostic {
            line: position.line(),
            column: position.position(),
            test: test.map(str::to_string),
        },
    )
}
