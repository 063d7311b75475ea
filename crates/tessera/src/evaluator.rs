//! Function dispatch: name lookup, argument adaptation, invocation.

use tessera_ast::FunctionNode;

use crate::builtins;
use crate::context::RenderContext;
use crate::error::{Result, TesseraError};
use crate::function::{coerce, Arg, Call, Function, ParamKind};
use crate::resolver::Resolver;
use crate::value::Value;

/// Evaluate a call. Host registrations shadow built-ins.
pub fn evaluate(node: &FunctionNode, resolver: &Resolver<'_>, context: &RenderContext) -> Result<Value> {
    let function = match context.function(&node.name) {
        Some(function) => function,
        None => builtins::lookup(&node.name).ok_or_else(|| TesseraError::UnknownFunction {
            name: node.name.clone(),
        })?,
    };

    let args = adapt_arguments(&node.name, function, &node.args, resolver)?;
    let needs_context = function.params().last() == Some(&ParamKind::Context);
    function.call(Call::new(&node.name, args, needs_context.then_some(context)))
}

/// Display text of a function result under the active locale.
pub fn display(value: &Value, context: &RenderContext) -> String {
    context.locale().display(value)
}

/// Resolve and coerce the argument texts against the declared parameters.
fn adapt_arguments(
    name: &str,
    function: &Function,
    texts: &[String],
    resolver: &Resolver<'_>,
) -> Result<Vec<Arg>> {
    let params = function.params();
    let positional = match params.split_last() {
        Some((ParamKind::Context, rest)) => rest,
        _ => params,
    };
    validate_signature(name, params, positional.len())?;

    let variadic = positional.last() == Some(&ParamKind::VariadicStrings);
    let fixed = if variadic {
        positional.len() - 1
    } else {
        positional.len()
    };

    let too_many = !variadic && texts.len() > fixed;
    if too_many || texts.len() < fixed {
        return Err(TesseraError::ArgumentCount {
            name: name.to_string(),
            expected: params.len(),
            received: texts.len(),
        });
    }

    let mut args = Vec::with_capacity(positional.len());
    for (index, (text, kind)) in texts.iter().zip(&positional[..fixed]).enumerate() {
        let value = resolver.argument(text)?;
        let value = match kind {
            ParamKind::Literal(ty) => {
                coerce(value, *ty).map_err(|cause| TesseraError::ParameterConversion {
                    function: name.to_string(),
                    index,
                    cause,
                })?
            }
            _ => value,
        };
        args.push(Arg::Value(value));
    }

    if variadic {
        let rest = texts[fixed..]
            .iter()
            .map(|text| resolver.argument(text).map(|value| value.to_string()))
            .collect::<Result<Vec<_>>>()?;
        args.push(Arg::Strings(rest));
    }

    Ok(args)
}

/// Context may only close the list and a variadic tail may only close the
/// positional part.
fn validate_signature(name: &str, params: &[ParamKind], positional: usize) -> Result<()> {
    for (index, kind) in params.iter().enumerate() {
        let misplaced = match kind {
            ParamKind::Context => index + 1 != params.len(),
            ParamKind::VariadicStrings => index + 1 != positional,
            ParamKind::Literal(_) => false,
        };
        if misplaced {
            return Err(TesseraError::InvalidSignature {
                name: name.to_string(),
                message: format!("parameter {index} must be the last one"),
            });
        }
    }
    Ok(())
}
