//! Lazy stream combinators.
//!
//! Every constructor here wraps one or more upstreams and pulls from them
//! only when its own `next` is called. Combinators with several upstreams
//! pulled on the same tick follow one termination rule: end of input takes
//! precedence over a sibling's error, and simultaneous end of input is end
//! of input.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::codec::{Decoder, Encoder};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::stream::{BoxStream, EventStream};

/// A stream that is immediately at end of input.
#[must_use]
pub fn empty() -> BoxStream {
    Box::new(Empty)
}

struct Empty;

impl EventStream for Empty {
    fn next(&mut self) -> Result<Option<Event>> {
        Ok(None)
    }

    fn remaining(&self) -> Option<usize> {
        Some(0)
    }
}

/// A finite stream over an in-memory list of events.
#[must_use]
pub fn from_events(events: Vec<Event>) -> BoxStream {
    Box::new(ListStream { events: events.into_iter() })
}

struct ListStream {
    events: std::vec::IntoIter<Event>,
}

impl EventStream for ListStream {
    fn next(&mut self) -> Result<Option<Event>> {
        Ok(self.events.next())
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.events.len())
    }

    fn drain(&mut self) -> Result<()> {
        self.events = Vec::new().into_iter();
        Ok(())
    }
}

/// Applies `f` to every event of `upstream`.
pub fn map<F>(upstream: BoxStream, f: F) -> BoxStream
where
    F: FnMut(Event) -> Result<Event> + Send + 'static,
{
    Box::new(MapStream { upstream, f })
}

struct MapStream<F> {
    upstream: BoxStream,
    f: F,
}

impl<F> EventStream for MapStream<F>
where
    F: FnMut(Event) -> Result<Event> + Send,
{
    fn next(&mut self) -> Result<Option<Event>> {
        match self.upstream.next()? {
            Some(evt) => (self.f)(evt).map(Some),
            None => Ok(None),
        }
    }
}

/// Zips several streams into a stream of arrays.
///
/// Pulls one event from each upstream in order; the result ends as soon
/// as any upstream ends.
#[must_use]
pub fn zip(streams: Vec<BoxStream>) -> BoxStream {
    Box::new(ZipStream { streams })
}

struct ZipStream {
    streams: Vec<BoxStream>,
}

impl EventStream for ZipStream {
    fn next(&mut self) -> Result<Option<Event>> {
        let mut out = Vec::with_capacity(self.streams.len());
        for stream in &mut self.streams {
            match stream.next()? {
                Some(evt) => out.push(evt),
                None => return Ok(None),
            }
        }
        Ok(Some(Event::Arr(out)))
    }
}

/// Pulls a lockstep pair, applying the termination rule for sibling
/// upstreams: end of input wins over an error, first error otherwise.
fn lockstep(
    data: Result<Option<Event>>,
    other: Result<Option<Event>>,
) -> Result<Option<(Event, Event)>> {
    match (data, other) {
        (Ok(None), _) | (_, Ok(None)) => Ok(None),
        (Err(e), _) | (_, Err(e)) => Err(e),
        (Ok(Some(a)), Ok(Some(b))) => Ok(Some((a, b))),
    }
}

/// Yields events of `data` whose corresponding `flags` event is `true`.
///
/// Both upstreams are pulled in lockstep; false flags are skipped by
/// pulling again, so a round in which every flag is false ends the pull
/// with the upstreams' end of input.
#[must_use]
pub fn filter(data: BoxStream, flags: BoxStream) -> BoxStream {
    Box::new(FilterStream { data, flags })
}

struct FilterStream {
    data: BoxStream,
    flags: BoxStream,
}

impl EventStream for FilterStream {
    fn next(&mut self) -> Result<Option<Event>> {
        loop {
            let pulled = {
                let d = self.data.next();
                let f = self.flags.next();
                lockstep(d, f)?
            };
            let Some((data, flag)) = pulled else {
                return Ok(None);
            };
            match flag {
                Event::Bool(true) => return Ok(Some(data)),
                Event::Bool(false) => {}
                other => {
                    return Err(Error::shape("filter", "bool flag", other.kind()));
                }
            }
        }
    }
}

/// Projects a dotted field path out of every (map-shaped) event.
pub fn get_field(upstream: BoxStream, path: String) -> BoxStream {
    map(upstream, move |evt| {
        evt.path(&path).cloned().ok_or_else(|| {
            Error::shape("get_field", format!("event with field \"{path}\""), evt.kind())
        })
    })
}

/// Sets a dotted field path on every event of `data` to the corresponding
/// event of `values`.
#[must_use]
pub fn set_field(data: BoxStream, values: BoxStream, path: String) -> BoxStream {
    Box::new(SetFieldStream { data, values, path })
}

struct SetFieldStream {
    data: BoxStream,
    values: BoxStream,
    path: String,
}

impl EventStream for SetFieldStream {
    fn next(&mut self) -> Result<Option<Event>> {
        let pulled = {
            let d = self.data.next();
            let v = self.values.next();
            lockstep(d, v)?
        };
        Ok(pulled.map(|(data, value)| data.with_path(&self.path, value)))
    }
}

/// Compares every event against a constant by deep structural equality.
///
/// With `negate` set the result is inverted (`!=`).
pub fn eq_val(upstream: BoxStream, value: Event, negate: bool) -> BoxStream {
    map(upstream, move |evt| Ok(Event::Bool((evt == value) ^ negate)))
}

/// Numeric comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Le,
}

impl CmpOp {
    fn eval(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Ge => value >= threshold,
            Self::Lt => value < threshold,
            Self::Le => value <= threshold,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

/// Compares every (numeric) event against a constant threshold.
pub fn compare(upstream: BoxStream, op: CmpOp, threshold: f64) -> BoxStream {
    map(upstream, move |evt| {
        let v = evt
            .as_num()
            .ok_or_else(|| Error::shape(op.name(), "number", evt.kind()))?;
        Ok(Event::Bool(op.eval(v, threshold)))
    })
}

/// Element-wise boolean combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// Logical disjunction.
    Or,
    /// Logical conjunction.
    And,
}

impl BoolOp {
    fn name(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
        }
    }
}

/// Combines several boolean streams element-wise.
///
/// Every upstream is pulled on every tick; all of them must yield bools.
#[must_use]
pub fn combine(streams: Vec<BoxStream>, op: BoolOp) -> BoxStream {
    Box::new(CombineStream { streams, op })
}

struct CombineStream {
    streams: Vec<BoxStream>,
    op: BoolOp,
}

impl EventStream for CombineStream {
    fn next(&mut self) -> Result<Option<Event>> {
        let pulled: Vec<Result<Option<Event>>> =
            self.streams.iter_mut().map(|s| s.next()).collect();
        if pulled.iter().any(|r| matches!(r, Ok(None))) {
            return Ok(None);
        }
        let mut acc = matches!(self.op, BoolOp::And);
        for result in pulled {
            let evt = result?.unwrap_or(Event::Null);
            let Some(b) = evt.as_bool() else {
                return Err(Error::shape(self.op.name(), "bool", evt.kind()));
            };
            acc = match self.op {
                BoolOp::Or => acc || b,
                BoolOp::And => acc && b,
            };
        }
        Ok(Some(Event::Bool(acc)))
    }
}

/// Direction of an extremum aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    /// Track the maximum.
    Max,
    /// Track the minimum.
    Min,
}

impl Extremum {
    fn better(self, candidate: f64, best: f64) -> bool {
        match self {
            Self::Max => candidate > best,
            Self::Min => candidate < best,
        }
    }

    fn seed(self) -> f64 {
        match self {
            Self::Max => f64::NEG_INFINITY,
            Self::Min => f64::INFINITY,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Max => "max_by",
            Self::Min => "min_by",
        }
    }
}

/// Terminal extremum: consumes both upstreams and yields the single
/// `data` event whose corresponding value was extremal, then ends.
#[must_use]
pub fn extremum(data: BoxStream, values: BoxStream, dir: Extremum) -> BoxStream {
    Box::new(ExtremumStream { data, values, dir, best: dir.seed(), best_data: Event::Null, done: false })
}

struct ExtremumStream {
    data: BoxStream,
    values: BoxStream,
    dir: Extremum,
    best: f64,
    best_data: Event,
    done: bool,
}

impl EventStream for ExtremumStream {
    fn next(&mut self) -> Result<Option<Event>> {
        if self.done {
            return Ok(None);
        }
        loop {
            let pulled = {
                let d = self.data.next();
                let v = self.values.next();
                lockstep(d, v)?
            };
            let Some((data, value)) = pulled else {
                self.done = true;
                return Ok(Some(self.best_data.clone()));
            };
            let v = value
                .as_num()
                .ok_or_else(|| Error::shape(self.dir.name(), "number", value.kind()))?;
            if self.dir.better(v, self.best) {
                self.best = v;
                self.best_data = data;
            }
        }
    }
}

/// When a rolling extremum emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    /// Only when a strict new extremum appears; other ticks are skipped.
    OnChange,
    /// The current best `data` on every tick.
    Every,
}

/// Rolling extremum over a live pair of upstreams.
///
/// End of input is reported but not latched: a later pull tries the
/// upstreams again, so a pipeline input that refills between publishes
/// keeps the aggregation alive.
#[must_use]
pub fn rolling_extremum(
    data: BoxStream,
    values: BoxStream,
    dir: Extremum,
    emit: EmitMode,
) -> BoxStream {
    Box::new(RollingExtremumStream {
        data,
        values,
        dir,
        emit,
        best: dir.seed(),
        best_data: Event::Null,
    })
}

struct RollingExtremumStream {
    data: BoxStream,
    values: BoxStream,
    dir: Extremum,
    emit: EmitMode,
    best: f64,
    best_data: Event,
}

impl RollingExtremumStream {
    fn op(&self) -> &'static str {
        match (self.dir, self.emit) {
            (Extremum::Max, EmitMode::OnChange) => "max_by_roll",
            (Extremum::Min, EmitMode::OnChange) => "min_by_roll",
            (Extremum::Max, EmitMode::Every) => "max_by_roll_all",
            (Extremum::Min, EmitMode::Every) => "min_by_roll_all",
        }
    }

    fn pull_pair(&mut self) -> Result<Option<(Event, f64)>> {
        let pulled = {
            let d = self.data.next();
            let v = self.values.next();
            lockstep(d, v)?
        };
        let Some((data, value)) = pulled else {
            return Ok(None);
        };
        let v = value
            .as_num()
            .ok_or_else(|| Error::shape(self.op(), "number", value.kind()))?;
        Ok(Some((data, v)))
    }
}

impl EventStream for RollingExtremumStream {
    fn next(&mut self) -> Result<Option<Event>> {
        match self.emit {
            EmitMode::OnChange => loop {
                let Some((data, v)) = self.pull_pair()? else {
                    return Ok(None);
                };
                if self.dir.better(v, self.best) {
                    self.best = v;
                    return Ok(Some(data));
                }
            },
            EmitMode::Every => {
                let Some((data, v)) = self.pull_pair()? else {
                    return Ok(None);
                };
                if self.dir.better(v, self.best) {
                    self.best = v;
                    self.best_data = data;
                }
                Ok(Some(self.best_data.clone()))
            }
        }
    }
}

/// Pulls one event, then yields it forever.
///
/// An upstream error before the first value propagates once; end of input
/// before the first value is end of input.
#[must_use]
pub fn repeat(upstream: BoxStream) -> BoxStream {
    Box::new(RepeatStream { upstream, value: None })
}

struct RepeatStream {
    upstream: BoxStream,
    value: Option<Event>,
}

impl EventStream for RepeatStream {
    fn next(&mut self) -> Result<Option<Event>> {
        if let Some(v) = &self.value {
            return Ok(Some(v.clone()));
        }
        match self.upstream.next()? {
            Some(v) => {
                self.value = Some(v.clone());
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }
}

/// Exponential moving average over a numeric stream.
///
/// `state = alpha * x + (1 - alpha) * state`; the first sample seeds the
/// state directly.
#[must_use]
pub fn ema(values: BoxStream, alpha: f64) -> BoxStream {
    Box::new(EmaStream { values, alpha, state: 0.0, started: false })
}

struct EmaStream {
    values: BoxStream,
    alpha: f64,
    state: f64,
    started: bool,
}

impl EventStream for EmaStream {
    fn next(&mut self) -> Result<Option<Event>> {
        let Some(evt) = self.values.next()? else {
            return Ok(None);
        };
        let v = evt
            .as_num()
            .ok_or_else(|| Error::shape("ema", "number", evt.kind()))?;
        if self.started {
            self.state = self.alpha * v + (1.0 - self.alpha) * self.state;
        } else {
            self.started = true;
            self.state = v;
        }
        Ok(Some(Event::Num(self.state)))
    }
}

/// Concatenates several streams into one longer stream.
///
/// A real error from any member aborts the whole chain.
#[must_use]
pub fn join(streams: Vec<BoxStream>) -> BoxStream {
    Box::new(JoinStream { streams: streams.into() })
}

struct JoinStream {
    streams: VecDeque<BoxStream>,
}

impl EventStream for JoinStream {
    fn next(&mut self) -> Result<Option<Event>> {
        loop {
            let Some(front) = self.streams.front_mut() else {
                return Ok(None);
            };
            match front.next() {
                Ok(Some(evt)) => return Ok(Some(evt)),
                Ok(None) => {
                    self.streams.pop_front();
                }
                Err(e) => {
                    self.streams.clear();
                    return Err(e);
                }
            }
        }
    }
}

/// String concatenation applied to every event.
#[derive(Debug, Clone)]
pub enum Affix {
    /// Append the string after each event.
    Suffix(String),
    /// Prepend the string before each event.
    Prefix(String),
}

/// Appends or prepends a constant string to every string event.
pub fn affix(upstream: BoxStream, affix: Affix) -> BoxStream {
    map(upstream, move |evt| {
        let op = match &affix {
            Affix::Suffix(_) => "append",
            Affix::Prefix(_) => "prepend",
        };
        let s = evt
            .as_str()
            .ok_or_else(|| Error::shape(op, "string", evt.kind()))?;
        Ok(Event::Str(match &affix {
            Affix::Suffix(suffix) => format!("{s}{suffix}"),
            Affix::Prefix(prefix) => format!("{prefix}{s}"),
        }))
    })
}

/// Encodes every event into its byte form.
pub fn encode(upstream: BoxStream, encoder: Arc<dyn Encoder>) -> BoxStream {
    map(upstream, move |evt| encoder.encode(&evt).map(Event::Bytes))
}

/// Decodes every byte event back into a structured event.
pub fn decode(upstream: BoxStream, decoder: Arc<dyn Decoder>) -> BoxStream {
    map(upstream, move |evt| match evt {
        Event::Bytes(bytes) => decoder.decode(&bytes),
        other => Err(Error::shape("decode", "bytes", other.kind())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{JsonDecoder, JsonEncoder};
    use crate::stream::collect;
    use serde_json::json;

    fn nums(values: &[f64]) -> BoxStream {
        from_events(values.iter().map(|v| Event::Num(*v)).collect())
    }

    fn strs(values: &[&str]) -> BoxStream {
        from_events(values.iter().map(|v| Event::from(*v)).collect())
    }

    #[test]
    fn empty_is_done_immediately() {
        let mut s = empty();
        assert_eq!(s.next().unwrap(), None);
        assert_eq!(s.remaining(), Some(0));
    }

    #[test]
    fn list_yields_then_ends() {
        let mut s = nums(&[1.0, 2.0]);
        assert_eq!(s.remaining(), Some(2));
        assert_eq!(s.next().unwrap(), Some(Event::Num(1.0)));
        assert_eq!(s.next().unwrap(), Some(Event::Num(2.0)));
        assert_eq!(s.next().unwrap(), None);
    }

    #[test]
    fn map_transforms_and_propagates_errors() {
        let mut doubled = map(nums(&[2.0]), |evt| {
            Ok(Event::Num(evt.as_num().unwrap_or_default() * 2.0))
        });
        assert_eq!(doubled.next().unwrap(), Some(Event::Num(4.0)));

        let mut failing = map(nums(&[1.0]), |_| Err(Error::Codec("boom".into())));
        assert!(failing.next().is_err());
    }

    #[test]
    fn zip_ends_with_shortest() {
        let mut s = zip(vec![nums(&[1.0, 2.0]), nums(&[10.0])]);
        assert_eq!(
            s.next().unwrap(),
            Some(Event::Arr(vec![Event::Num(1.0), Event::Num(10.0)]))
        );
        assert_eq!(s.next().unwrap(), None);
    }

    #[test]
    fn filter_gates_on_flags() {
        let data = nums(&[1.0, 2.0, 3.0, 4.0]);
        let flags = from_events(vec![
            Event::Bool(false),
            Event::Bool(true),
            Event::Bool(false),
            Event::Bool(true),
        ]);
        let mut s = filter(data, flags);
        assert_eq!(collect(s.as_mut()).unwrap(), vec![Event::Num(2.0), Event::Num(4.0)]);
    }

    #[test]
    fn filter_rejects_non_bool_flags() {
        let mut s = filter(nums(&[1.0]), nums(&[1.0]));
        assert!(matches!(s.next(), Err(Error::Shape { op: "filter", .. })));
    }

    #[test]
    fn get_field_errors_on_missing() {
        let events = vec![Event::from(json!({"x": 5}))];
        let mut ok = get_field(from_events(events.clone()), "x".into());
        assert_eq!(ok.next().unwrap(), Some(Event::Num(5.0)));

        let mut missing = get_field(from_events(events), "y".into());
        assert!(matches!(missing.next(), Err(Error::Shape { op: "get_field", .. })));
    }

    #[test]
    fn set_field_updates_in_lockstep() {
        let data = from_events(vec![Event::from(json!({"a": 1}))]);
        let values = nums(&[9.0]);
        let mut s = set_field(data, values, "a".into());
        let out = s.next().unwrap().unwrap();
        assert_eq!(out.path("a"), Some(&Event::Num(9.0)));
    }

    #[test]
    fn eq_and_neq() {
        let mut eq = eq_val(nums(&[1.0, 2.0]), Event::Num(2.0), false);
        assert_eq!(collect(eq.as_mut()).unwrap(), vec![Event::Bool(false), Event::Bool(true)]);

        let mut neq = eq_val(nums(&[1.0, 2.0]), Event::Num(2.0), true);
        assert_eq!(collect(neq.as_mut()).unwrap(), vec![Event::Bool(true), Event::Bool(false)]);
    }

    #[test]
    fn comparisons() {
        let mut gt = compare(nums(&[1.0, 5.0]), CmpOp::Gt, 3.0);
        assert_eq!(collect(gt.as_mut()).unwrap(), vec![Event::Bool(false), Event::Bool(true)]);

        let mut le = compare(nums(&[3.0, 4.0]), CmpOp::Le, 3.0);
        assert_eq!(collect(le.as_mut()).unwrap(), vec![Event::Bool(true), Event::Bool(false)]);

        let mut bad = compare(strs(&["x"]), CmpOp::Lt, 0.0);
        assert!(bad.next().is_err());
    }

    #[test]
    fn boolean_combine() {
        let bools = |vs: &[bool]| from_events(vs.iter().map(|b| Event::Bool(*b)).collect());
        let mut or = combine(vec![bools(&[true, false]), bools(&[false, false])], BoolOp::Or);
        assert_eq!(collect(or.as_mut()).unwrap(), vec![Event::Bool(true), Event::Bool(false)]);

        let mut and = combine(vec![bools(&[true, true]), bools(&[true, false])], BoolOp::And);
        assert_eq!(collect(and.as_mut()).unwrap(), vec![Event::Bool(true), Event::Bool(false)]);
    }

    #[test]
    fn terminal_extremum_yields_once() {
        let data = strs(&["a", "b", "c"]);
        let values = nums(&[1.0, 7.0, 3.0]);
        let mut s = extremum(data, values, Extremum::Max);
        assert_eq!(s.next().unwrap(), Some(Event::from("b")));
        assert_eq!(s.next().unwrap(), None);
    }

    #[test]
    fn rolling_max_emits_on_new_extremum() {
        // values 1,3,2,5,4 -> emits at 1,3,5
        let data = strs(&["a", "b", "c", "d", "e"]);
        let values = nums(&[1.0, 3.0, 2.0, 5.0, 4.0]);
        let mut s = rolling_extremum(data, values, Extremum::Max, EmitMode::OnChange);
        assert_eq!(
            collect(s.as_mut()).unwrap(),
            vec![Event::from("a"), Event::from("b"), Event::from("d")]
        );
    }

    #[test]
    fn rolling_min_all_emits_best_every_tick() {
        let data = strs(&["a", "b", "c"]);
        let values = nums(&[3.0, 1.0, 2.0]);
        let mut s = rolling_extremum(data, values, Extremum::Min, EmitMode::Every);
        assert_eq!(
            collect(s.as_mut()).unwrap(),
            vec![Event::from("a"), Event::from("b"), Event::from("b")]
        );
    }

    #[test]
    fn rolling_does_not_latch_end_of_input() {
        let data = strs(&["a"]);
        let values = nums(&[1.0]);
        let mut s = rolling_extremum(data, values, Extremum::Max, EmitMode::OnChange);
        assert_eq!(s.next().unwrap(), Some(Event::from("a")));
        assert_eq!(s.next().unwrap(), None);
        // pulling again retries the upstreams instead of staying dead
        assert_eq!(s.next().unwrap(), None);
    }

    #[test]
    fn repeat_caches_first_value() {
        let mut s = repeat(nums(&[7.0, 8.0]));
        assert_eq!(s.next().unwrap(), Some(Event::Num(7.0)));
        assert_eq!(s.next().unwrap(), Some(Event::Num(7.0)));
        assert_eq!(s.next().unwrap(), Some(Event::Num(7.0)));
    }

    #[test]
    fn ema_seeds_then_smooths() {
        let mut s = ema(nums(&[10.0, 20.0]), 0.5);
        assert_eq!(s.next().unwrap(), Some(Event::Num(10.0)));
        assert_eq!(s.next().unwrap(), Some(Event::Num(15.0)));
        assert_eq!(s.next().unwrap(), None);
    }

    #[test]
    fn join_concatenates() {
        let mut s = join(vec![nums(&[1.0]), nums(&[2.0, 3.0])]);
        assert_eq!(
            collect(s.as_mut()).unwrap(),
            vec![Event::Num(1.0), Event::Num(2.0), Event::Num(3.0)]
        );
    }

    #[test]
    fn affix_both_sides() {
        let mut suffixed = affix(strs(&["x"]), Affix::Suffix("!".into()));
        assert_eq!(suffixed.next().unwrap(), Some(Event::from("x!")));

        let mut prefixed = affix(strs(&["x"]), Affix::Prefix(">".into()));
        assert_eq!(prefixed.next().unwrap(), Some(Event::from(">x")));

        let mut bad = affix(nums(&[1.0]), Affix::Suffix("!".into()));
        assert!(bad.next().is_err());
    }

    #[test]
    fn encode_decode_round_trip() {
        let original = Event::from(json!({"k": [1, 2]}));
        let mut encoded = encode(from_events(vec![original.clone()]), Arc::new(JsonEncoder));
        let bytes = encoded.next().unwrap().unwrap();
        assert!(matches!(bytes, Event::Bytes(_)));

        let mut decoded = decode(from_events(vec![bytes]), Arc::new(JsonDecoder));
        assert_eq!(decoded.next().unwrap(), Some(original));
    }

    #[test]
    fn decode_rejects_non_bytes() {
        let mut s = decode(nums(&[1.0]), Arc::new(JsonDecoder));
        assert!(matches!(s.next(), Err(Error::Shape { op: "decode", .. })));
    }
}
