//! Built-in stage functions.
//!
//! One registration per combinator, each doing its own arity and
//! argument-shape validation so that every malformed definition is caught
//! at compile time.

use serde_json::Value;

use crate::error::{CompileError, Result};
use crate::event::Event;
use crate::stream::combinators::{self, Affix, BoolOp, CmpOp, EmitMode, Extremum};
use crate::stream::BoxStream;

use super::{Compiler, Scope};

pub(super) fn register_defaults(compiler: &mut Compiler) {
    compiler.register("", id);
    compiler.register("id", id);
    compiler.register("load", load);
    compiler.register("save", save);
    compiler.register("zip", zip);
    compiler.register("get_field", get_field);
    compiler.register("set_field", set_field);
    compiler.register("==", |c, s, a| eq(c, s, a, "==", false));
    compiler.register("!=", |c, s, a| eq(c, s, a, "!=", true));
    compiler.register(">", |c, s, a| cmp(c, s, a, CmpOp::Gt));
    compiler.register(">=", |c, s, a| cmp(c, s, a, CmpOp::Ge));
    compiler.register("<", |c, s, a| cmp(c, s, a, CmpOp::Lt));
    compiler.register("<=", |c, s, a| cmp(c, s, a, CmpOp::Le));
    compiler.register("||", |c, s, a| bool_combine(c, s, a, BoolOp::Or));
    compiler.register("&&", |c, s, a| bool_combine(c, s, a, BoolOp::And));
    compiler.register("filter", filter);
    compiler.register("max_by", |c, s, a| extremum(c, s, a, "max_by", Extremum::Max));
    compiler.register("min_by", |c, s, a| extremum(c, s, a, "min_by", Extremum::Min));
    compiler.register("max_by_roll", |c, s, a| {
        rolling(c, s, a, "max_by_roll", Extremum::Max, EmitMode::OnChange)
    });
    compiler.register("min_by_roll", |c, s, a| {
        rolling(c, s, a, "min_by_roll", Extremum::Min, EmitMode::OnChange)
    });
    compiler.register("max_by_roll_all", |c, s, a| {
        rolling(c, s, a, "max_by_roll_all", Extremum::Max, EmitMode::Every)
    });
    compiler.register("min_by_roll_all", |c, s, a| {
        rolling(c, s, a, "min_by_roll_all", Extremum::Min, EmitMode::Every)
    });
    compiler.register("repeat", repeat);
    compiler.register("ema", ema);
    compiler.register("ema_n", ema_n);
    compiler.register("append", |c, s, a| affix(c, s, a, "append"));
    compiler.register("prepend", |c, s, a| affix(c, s, a, "prepend"));
    compiler.register("encode", encode);
    compiler.register("decode", decode);
}

fn expect_arity(name: &str, args: &[Value], n: usize) -> Result<()> {
    if args.len() == n {
        return Ok(());
    }
    Err(CompileError::Arity {
        name: name.to_string(),
        expected: n.to_string(),
        got: args.len(),
    }
    .into())
}

fn expect_many(name: &str, args: &[Value]) -> Result<()> {
    if args.len() > 1 {
        return Ok(());
    }
    Err(CompileError::Arity {
        name: name.to_string(),
        expected: "more than 1".to_string(),
        got: args.len(),
    }
    .into())
}

fn expect_str<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a str> {
    args[index].as_str().ok_or_else(|| {
        CompileError::Argument {
            name: name.to_string(),
            index,
            expected: "string".to_string(),
            got: args[index].to_string(),
        }
        .into()
    })
}

fn expect_num(name: &str, args: &[Value], index: usize) -> Result<f64> {
    args[index].as_f64().ok_or_else(|| {
        CompileError::Argument {
            name: name.to_string(),
            index,
            expected: "number".to_string(),
            got: args[index].to_string(),
        }
        .into()
    })
}

fn build_all(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<Vec<BoxStream>> {
    args.iter().map(|a| compiler.build(scope, a)).collect()
}

fn id(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_arity("id", args, 1)?;
    compiler.build(scope, &args[0])
}

fn load(_: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_arity("load", args, 1)?;
    let name = expect_str("load", args, 0)?;
    scope
        .reader(name)
        .ok_or_else(|| CompileError::UnboundName(name.to_string()).into())
}

fn save(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_arity("save", args, 2)?;
    let name = expect_str("save", args, 0)?.to_string();
    let stream = compiler.build(scope, &args[1])?;
    scope.bind(&name, stream)?;
    Ok(combinators::empty())
}

fn zip(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_many("zip", args)?;
    Ok(combinators::zip(build_all(compiler, scope, args)?))
}

fn get_field(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_arity("get_field", args, 2)?;
    let upstream = compiler.build(scope, &args[0])?;
    let path = expect_str("get_field", args, 1)?.to_string();
    Ok(combinators::get_field(upstream, path))
}

fn set_field(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_arity("set_field", args, 3)?;
    let data = compiler.build(scope, &args[0])?;
    let path = expect_str("set_field", args, 1)?.to_string();
    let values = compiler.build(scope, &args[2])?;
    Ok(combinators::set_field(data, values, path))
}

fn eq(
    compiler: &Compiler,
    scope: &mut Scope,
    args: &[Value],
    name: &str,
    negate: bool,
) -> Result<BoxStream> {
    expect_arity(name, args, 2)?;
    let upstream = compiler.build(scope, &args[0])?;
    Ok(combinators::eq_val(upstream, Event::from(args[1].clone()), negate))
}

fn cmp(compiler: &Compiler, scope: &mut Scope, args: &[Value], op: CmpOp) -> Result<BoxStream> {
    let name = match op {
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
    };
    expect_arity(name, args, 2)?;
    let upstream = compiler.build(scope, &args[0])?;
    let threshold = expect_num(name, args, 1)?;
    Ok(combinators::compare(upstream, op, threshold))
}

fn bool_combine(
    compiler: &Compiler,
    scope: &mut Scope,
    args: &[Value],
    op: BoolOp,
) -> Result<BoxStream> {
    let name = match op {
        BoolOp::Or => "||",
        BoolOp::And => "&&",
    };
    expect_many(name, args)?;
    Ok(combinators::combine(build_all(compiler, scope, args)?, op))
}

fn filter(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_arity("filter", args, 2)?;
    let data = compiler.build(scope, &args[0])?;
    let flags = compiler.build(scope, &args[1])?;
    Ok(combinators::filter(data, flags))
}

fn extremum(
    compiler: &Compiler,
    scope: &mut Scope,
    args: &[Value],
    name: &str,
    dir: Extremum,
) -> Result<BoxStream> {
    expect_arity(name, args, 2)?;
    let data = compiler.build(scope, &args[0])?;
    let values = compiler.build(scope, &args[1])?;
    Ok(combinators::extremum(data, values, dir))
}

fn rolling(
    compiler: &Compiler,
    scope: &mut Scope,
    args: &[Value],
    name: &str,
    dir: Extremum,
    emit: EmitMode,
) -> Result<BoxStream> {
    expect_arity(name, args, 2)?;
    let data = compiler.build(scope, &args[0])?;
    let values = compiler.build(scope, &args[1])?;
    Ok(combinators::rolling_extremum(data, values, dir, emit))
}

fn repeat(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_arity("repeat", args, 1)?;
    let upstream = compiler.build(scope, &args[0])?;
    Ok(combinators::repeat(upstream))
}

fn ema(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_arity("ema", args, 2)?;
    let values = compiler.build(scope, &args[0])?;
    let alpha = expect_num("ema", args, 1)?;
    Ok(combinators::ema(values, alpha))
}

fn ema_n(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_arity("ema_n", args, 2)?;
    let values = compiler.build(scope, &args[0])?;
    let n = expect_num("ema_n", args, 1)?;
    Ok(combinators::ema(values, 1.0 / (n + 1.0)))
}

fn affix(compiler: &Compiler, scope: &mut Scope, args: &[Value], name: &str) -> Result<BoxStream> {
    expect_arity(name, args, 2)?;
    let upstream = compiler.build(scope, &args[0])?;
    let text = expect_str(name, args, 1)?.to_string();
    let affix = if name == "append" { Affix::Suffix(text) } else { Affix::Prefix(text) };
    Ok(combinators::affix(upstream, affix))
}

fn encode(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_arity("encode", args, 2)?;
    let upstream = compiler.build(scope, &args[0])?;
    let name = expect_str("encode", args, 1)?;
    let encoder = compiler
        .codecs()
        .encoder(name)
        .ok_or_else(|| CompileError::UnknownEncoder(name.to_string()))?;
    Ok(combinators::encode(upstream, encoder))
}

fn decode(compiler: &Compiler, scope: &mut Scope, args: &[Value]) -> Result<BoxStream> {
    expect_arity("decode", args, 2)?;
    let upstream = compiler.build(scope, &args[0])?;
    let name = expect_str("decode", args, 1)?;
    let decoder = compiler
        .codecs()
        .decoder(name)
        .ok_or_else(|| CompileError::UnknownDecoder(name.to_string()))?;
    Ok(combinators::decode(upstream, decoder))
}
