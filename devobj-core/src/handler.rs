//! Command handlers.
//!
//! Each handler takes a tokenized request, renders exactly one response into
//! the caller's [`ResponseWriter`] and returns the status it rendered. On any
//! failure the whole response is replaced by that status line.

use crate::codec;
use crate::object::{Access, DataObject, Value};
use crate::registry::Registry;
use devobj_protocol::{
    Overflow, Request, ResponseWriter, Status, Token, TokenKind, PUBLICATION_PREFIX,
};

/// A request function selected by the `!<name>` prefix of a text request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Read,
    Write,
    List,
    Exec,
}

impl Function {
    pub const ALL: [Function; 4] = [
        Function::Read,
        Function::Write,
        Function::List,
        Function::Exec,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::Read => "read",
            Function::Write => "write",
            Function::List => "list",
            Function::Exec => "exec",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|function| function.name() == name)
    }

    /// Splits `!<function> <args>` into the function and its raw argument
    /// text.
    pub fn parse(text: &str) -> Option<(Self, &str)> {
        let body = text.strip_prefix('!')?;
        let (word, args) = match body.find(char::is_whitespace) {
            Some(split) => body.split_at(split),
            None => (body, ""),
        };
        Self::from_name(word).map(|function| (function, args))
    }

    pub fn call(
        self,
        req: &Request<'_>,
        resp: &mut ResponseWriter<'_>,
        registry: &Registry<'_>,
    ) -> Status {
        match self {
            Function::Read => read(req, resp, registry),
            Function::Write => write(req, resp, registry),
            Function::List => list(req, resp, registry),
            Function::Exec => exec(req, resp, registry),
        }
    }
}

/// Parses and executes a text request such as `!read ["a", "b"]`.
///
/// `tokens` bounds the size of the request; running out of tokens renders
/// request-too-long.
pub fn process(
    text: &str,
    registry: &Registry<'_>,
    tokens: &mut [Token],
    resp: &mut ResponseWriter<'_>,
) -> Status {
    let (function, args) = match Function::parse(text) {
        Some(parsed) => parsed,
        None => {
            tracing::debug!("Unknown function in request: {:?}", text);
            return resp.status(Status::UnknownFunction);
        }
    };

    let req = match Request::parse(args.trim(), tokens) {
        Ok(req) => req,
        Err(e) => {
            tracing::debug!("Failed to tokenize {} request: {}", function.name(), e);
            return resp.status(e.status());
        }
    };

    function.call(&req, resp, registry)
}

/// Reads one object (`"name"`), several (`["a", "b"]`) or none (empty).
pub fn read(req: &Request<'_>, resp: &mut ResponseWriter<'_>, registry: &Registry<'_>) -> Status {
    let tokens = req.tokens();
    let (names, is_array) = match tokens {
        [] => return resp.status(Status::Success),
        [first, rest @ ..] if first.kind == TokenKind::Array => (rest, true),
        [_] => (tokens, false),
        _ => {
            tracing::debug!("Read request with {} bare tokens", tokens.len());
            return resp.status(Status::WrongFormat);
        }
    };

    resp.status(Status::Success);
    match render_values(req, names, is_array, resp, registry) {
        Ok(()) => Status::Success,
        Err(status) => resp.status(status),
    }
}

fn render_values(
    req: &Request<'_>,
    names: &[Token],
    is_array: bool,
    resp: &mut ResponseWriter<'_>,
    registry: &Registry<'_>,
) -> Result<(), Status> {
    resp.append(" ")?;
    if is_array {
        resp.open_array()?;
    }
    for token in names {
        if token.kind != TokenKind::String {
            tracing::debug!("Read request names a non-string {:?}", token.kind);
            return Err(Status::WrongFormat);
        }
        let object = resolve(registry, req.text_of(token), Access::READ)?;
        codec::serialize(resp, object, false).map_err(|status| {
            tracing::debug!("Failed to serialize {}: {}", object.name, status);
            status
        })?;
    }
    resp.trim_separator();
    if is_array {
        resp.close_array()?;
    }
    Ok(())
}

/// Writes name/value pairs, all or nothing.
///
/// Accepts `{"a": 1, "b": "x"}` or the bare form `"a", 1, "b", "x"`. Every
/// pair is validated before any value is stored.
pub fn write(req: &Request<'_>, resp: &mut ResponseWriter<'_>, registry: &Registry<'_>) -> Status {
    let pairs = match pair_tokens(req.tokens()) {
        Ok(pairs) => pairs,
        Err(status) => return resp.status(status),
    };

    for pair in pairs.chunks_exact(2) {
        if let Err(status) = validate_pair(req, &pair[0], &pair[1], registry) {
            return resp.status(status);
        }
    }

    for pair in pairs.chunks_exact(2) {
        let name = req.text_of(&pair[0]);
        let value = &pair[1];
        match registry.find_by_name(name) {
            Some(object) => {
                if let Err(status) = codec::commit(object, value.kind, req.text_of(value)) {
                    tracing::error!("Commit of validated value for {} failed: {}", name, status);
                }
            }
            None => tracing::error!("Object {} disappeared between validation and commit", name),
        }
    }

    resp.status(Status::Success)
}

fn pair_tokens(tokens: &[Token]) -> Result<&[Token], Status> {
    if tokens.len() < 2 {
        tracing::debug!("Write request with {} tokens", tokens.len());
        return Err(Status::WrongFormat);
    }
    let pairs = match tokens[0].kind {
        TokenKind::Object => &tokens[1..],
        _ => tokens,
    };
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        tracing::debug!("Write request has a key without a value");
        return Err(Status::WrongFormat);
    }
    Ok(pairs)
}

fn validate_pair(
    req: &Request<'_>,
    key: &Token,
    value: &Token,
    registry: &Registry<'_>,
) -> Result<(), Status> {
    if key.kind != TokenKind::String
        || !matches!(value.kind, TokenKind::String | TokenKind::Primitive)
    {
        tracing::debug!(
            "Write pair has unsupported tokens {:?}: {:?}",
            key.kind,
            value.kind
        );
        return Err(Status::WrongFormat);
    }

    let object = resolve(registry, req.text_of(key), Access::WRITE)?;
    codec::validate(object, value.kind, req.text_of(value)).map_err(|status| {
        tracing::debug!(
            "Rejected value {:?} for {}: {}",
            req.text_of(value),
            object.name,
            status
        );
        status
    })
}

/// Lists the names of readable objects, optionally limited to a category.
///
/// An empty request or an empty category name lists every category.
pub fn list(req: &Request<'_>, resp: &mut ResponseWriter<'_>, registry: &Registry<'_>) -> Status {
    let mask = match req.tokens() {
        [] => 0,
        [token] if token.kind == TokenKind::String => {
            let category = req.text_of(token);
            if category.is_empty() {
                0
            } else {
                match registry.category_mask(category) {
                    Some(mask) => mask,
                    None => {
                        tracing::debug!("Unknown category: {}", category);
                        return resp.status(Status::UnknownObject);
                    }
                }
            }
        }
        _ => return resp.status(Status::WrongFormat),
    };

    resp.status(Status::Success);
    match render_names(resp, registry, mask) {
        Ok(()) => Status::Success,
        Err(overflow) => resp.status(overflow.into()),
    }
}

fn render_names(
    resp: &mut ResponseWriter<'_>,
    registry: &Registry<'_>,
    mask: u16,
) -> Result<(), Overflow> {
    resp.append(" ")?;
    resp.open_array()?;
    for object in registry
        .iter()
        .filter(|object| object.can(Access::READ) && object.in_category(mask))
    {
        resp.append_fmt(format_args!("\"{}\", ", object.name))?;
    }
    resp.trim_separator();
    resp.close_array()
}

/// Invokes a function object. The function runs only after every check
/// passed.
pub fn exec(req: &Request<'_>, resp: &mut ResponseWriter<'_>, registry: &Registry<'_>) -> Status {
    let name = match req.tokens() {
        [token] if token.kind == TokenKind::String => req.text_of(token),
        _ => return resp.status(Status::WrongFormat),
    };

    let object = match resolve(registry, name, Access::EXEC) {
        Ok(object) => object,
        Err(status) => return resp.status(status),
    };

    match object.value {
        Value::Exec(function) => {
            tracing::debug!("Executing {}", object.name);
            function();
            resp.status(Status::Success)
        }
        _ => {
            tracing::debug!("{} is a {}, not a function", name, object.object_type());
            resp.status(Status::WrongType)
        }
    }
}

/// Renders a publication message `# {"name":value, ...}` for `ids`.
///
/// Ids with no matching object are skipped. There is no access check: the
/// id list is configured by the embedder. On overflow the buffer holds a
/// partial message and must not be sent.
pub fn publish(ids: &[u16], resp: &mut ResponseWriter<'_>, registry: &Registry<'_>) -> Status {
    resp.clear();
    match render_publication(ids, resp, registry) {
        Ok(()) => Status::Success,
        Err(status) => {
            tracing::debug!("Failed to render publication: {}", status);
            status
        }
    }
}

fn render_publication(
    ids: &[u16],
    resp: &mut ResponseWriter<'_>,
    registry: &Registry<'_>,
) -> Result<(), Status> {
    resp.append(PUBLICATION_PREFIX)?;
    resp.open_object()?;
    for &id in ids {
        match registry.find_by_id(id) {
            Some(object) => codec::serialize(resp, object, true)?,
            None => tracing::debug!("Skipping unknown object {:#06x} in publication", id),
        }
    }
    resp.trim_separator();
    resp.close_object()?;
    Ok(())
}

fn resolve<'r, 'a>(
    registry: &'r Registry<'a>,
    name: &str,
    access: Access,
) -> Result<&'r DataObject<'a>, Status> {
    let object = registry.find_by_name(name).ok_or_else(|| {
        tracing::debug!("Data object not found: {:?}", name);
        Status::UnknownObject
    })?;
    if !object.can(access) {
        tracing::debug!("Access {:#05b} denied on {}", access.bits(), name);
        return Err(Status::Unauthorized);
    }
    Ok(object)
}
