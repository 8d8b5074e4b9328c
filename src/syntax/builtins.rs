//! Catalog of the built-in functions Rego policies can call.
//!
//! Parameter entries are type descriptions rather than names; they are
//! shown in signatures and used as snippet placeholders.

/// Static documentation shown under every built-in signature.
pub const BUILTIN_DETAIL: &str =
    "built-in function\n\nSee https://www.openpolicyagent.org/docs/latest/policy-reference/#built-in-functions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtin {
    pub name: &'static str,
    pub params: &'static [&'static str],
    /// Operators such as `+` or `==`; these never appear in completion or
    /// hover.
    pub infix: bool,
}

impl Builtin {
    /// `name(param, param)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.params.join(", "))
    }

    /// The signature followed by the static documentation.
    pub fn documentation(&self) -> String {
        format!("{}\n\n{}", self.signature(), BUILTIN_DETAIL)
    }
}

const fn f(name: &'static str, params: &'static [&'static str]) -> Builtin {
    Builtin {
        name,
        params,
        infix: false,
    }
}

const fn op(name: &'static str, params: &'static [&'static str]) -> Builtin {
    Builtin {
        name,
        params,
        infix: true,
    }
}

/// Look a built-in up by its qualified name.
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// Whether `name` is the first segment of any dotted built-in name.
pub fn is_namespace(name: &str) -> bool {
    BUILTINS
        .iter()
        .any(|b| b.name.strip_prefix(name).is_some_and(|rest| rest.starts_with('.')))
}

/// Non-infix built-ins, the ones users can name.
pub fn callable() -> impl Iterator<Item = &'static Builtin> {
    BUILTINS.iter().filter(|b| !b.infix)
}

pub static BUILTINS: &[Builtin] = &[
    // Operators
    op("assign", &["any", "any"]),
    op("eq", &["any", "any"]),
    op("equal", &["any", "any"]),
    op("neq", &["any", "any"]),
    op("gt", &["any", "any"]),
    op("gte", &["any", "any"]),
    op("lt", &["any", "any"]),
    op("lte", &["any", "any"]),
    op("plus", &["number", "number"]),
    op("minus", &["any<number, set[any]>", "any<number, set[any]>"]),
    op("mul", &["number", "number"]),
    op("div", &["number", "number"]),
    op("rem", &["number", "number"]),
    op("and", &["set[any]", "set[any]"]),
    op("or", &["set[any]", "set[any]"]),
    op("internal.member_2", &["any", "any"]),
    op("internal.member_3", &["any", "any", "any"]),
    // Numbers
    f("abs", &["number"]),
    f("ceil", &["number"]),
    f("floor", &["number"]),
    f("round", &["number"]),
    f("numbers.range", &["number", "number"]),
    f("numbers.range_step", &["number", "number", "number"]),
    f("rand.intn", &["string", "number"]),
    f("to_number", &["any<null, boolean, number, string>"]),
    // Aggregates
    f("count", &["any<string, array[any], object[any: any], set[any]>"]),
    f("sum", &["any<array[number], set[number]>"]),
    f("product", &["any<array[number], set[number]>"]),
    f("max", &["any<array[any], set[any]>"]),
    f("min", &["any<array[any], set[any]>"]),
    f("sort", &["any<array[any], set[any]>"]),
    // Arrays, sets and objects
    f("array.concat", &["array[any]", "array[any]"]),
    f("array.reverse", &["array[any]"]),
    f("array.slice", &["array[any]", "number", "number"]),
    f("intersection", &["set[set[any]]"]),
    f("union", &["set[set[any]]"]),
    f("object.filter", &["object[any: any]", "any<array[any], object[any: any], set[any]>"]),
    f("object.get", &["object[any: any]", "any", "any"]),
    f("object.keys", &["object[any: any]"]),
    f("object.remove", &["object[any: any]", "any<array[any], object[any: any], set[any]>"]),
    f("object.subset", &["any<object[any: any], set[any], array[any]>", "any<object[any: any], set[any], array[any]>"]),
    f("object.union", &["object[any: any]", "object[any: any]"]),
    f("object.union_n", &["array[object[any: any]]"]),
    // Strings
    f("concat", &["string", "any<array[string], set[string]>"]),
    f("contains", &["string", "string"]),
    f("endswith", &["string", "string"]),
    f("format_int", &["number", "number"]),
    f("indexof", &["string", "string"]),
    f("indexof_n", &["string", "string"]),
    f("lower", &["string"]),
    f("replace", &["string", "string", "string"]),
    f("split", &["string", "string"]),
    f("sprintf", &["string", "array[any]"]),
    f("startswith", &["string", "string"]),
    f("strings.any_prefix_match", &["any<string, array[string], set[string]>", "any<string, array[string], set[string]>"]),
    f("strings.any_suffix_match", &["any<string, array[string], set[string]>", "any<string, array[string], set[string]>"]),
    f("strings.count", &["string", "string"]),
    f("strings.render_template", &["string", "object[string: any]"]),
    f("strings.replace_n", &["object[string: string]", "string"]),
    f("strings.reverse", &["string"]),
    f("substring", &["string", "number", "number"]),
    f("trim", &["string", "string"]),
    f("trim_left", &["string", "string"]),
    f("trim_prefix", &["string", "string"]),
    f("trim_right", &["string", "string"]),
    f("trim_space", &["string"]),
    f("trim_suffix", &["string", "string"]),
    f("upper", &["string"]),
    // Regular expressions and globs
    f("regex.find_all_string_submatch_n", &["string", "string", "number"]),
    f("regex.find_n", &["string", "string", "number"]),
    f("regex.globs_match", &["string", "string"]),
    f("regex.is_valid", &["any"]),
    f("regex.match", &["string", "string"]),
    f("regex.replace", &["string", "string", "string"]),
    f("regex.split", &["string", "string"]),
    f("regex.template_match", &["string", "string", "string", "string"]),
    f("glob.match", &["string", "any<null, array[string]>", "string"]),
    f("glob.quote_meta", &["string"]),
    // Types
    f("is_array", &["any"]),
    f("is_boolean", &["any"]),
    f("is_null", &["any"]),
    f("is_number", &["any"]),
    f("is_object", &["any"]),
    f("is_set", &["any"]),
    f("is_string", &["any"]),
    f("type_name", &["any"]),
    // Encoding
    f("base64.decode", &["string"]),
    f("base64.encode", &["string"]),
    f("base64.is_valid", &["string"]),
    f("base64url.decode", &["string"]),
    f("base64url.encode", &["string"]),
    f("base64url.encode_no_pad", &["string"]),
    f("hex.decode", &["string"]),
    f("hex.encode", &["string"]),
    f("json.filter", &["object[any: any]", "any<array[any<string, array[any]>], set[any<string, array[any]>]>"]),
    f("json.is_valid", &["string"]),
    f("json.marshal", &["any"]),
    f("json.match_schema", &["any<string, object[any: any]>", "any<string, object[any: any]>"]),
    f("json.patch", &["any", "array[object<op: string, path: any>[any: any]]"]),
    f("json.remove", &["object[any: any]", "any<array[any<string, array[any]>], set[any<string, array[any]>]>"]),
    f("json.unmarshal", &["string"]),
    f("json.verify_schema", &["any<string, object[any: any]>"]),
    f("urlquery.decode", &["string"]),
    f("urlquery.decode_object", &["string"]),
    f("urlquery.encode", &["string"]),
    f("urlquery.encode_object", &["object[string: any<string, array[string], set[string]>]"]),
    f("yaml.is_valid", &["string"]),
    f("yaml.marshal", &["any"]),
    f("yaml.unmarshal", &["string"]),
    // Time
    f("time.add_date", &["number", "number", "number", "number"]),
    f("time.clock", &["any<number, array<number, string>>"]),
    f("time.date", &["any<number, array<number, string>>"]),
    f("time.diff", &["any<number, array<number, string>>", "any<number, array<number, string>>"]),
    f("time.format", &["any<number, array<number, string>, array<number, string, string>>"]),
    f("time.now_ns", &[]),
    f("time.parse_duration_ns", &["string"]),
    f("time.parse_ns", &["string", "string"]),
    f("time.parse_rfc3339_ns", &["string"]),
    f("time.weekday", &["any<number, array<number, string>>"]),
    // Cryptography and tokens
    f("crypto.hmac.equal", &["string", "string"]),
    f("crypto.hmac.md5", &["string", "string"]),
    f("crypto.hmac.sha1", &["string", "string"]),
    f("crypto.hmac.sha256", &["string", "string"]),
    f("crypto.hmac.sha512", &["string", "string"]),
    f("crypto.md5", &["string"]),
    f("crypto.sha1", &["string"]),
    f("crypto.sha256", &["string"]),
    f("crypto.x509.parse_and_verify_certificates", &["string"]),
    f("crypto.x509.parse_certificate_request", &["string"]),
    f("crypto.x509.parse_certificates", &["string"]),
    f("crypto.x509.parse_keypair", &["string", "string"]),
    f("crypto.x509.parse_rsa_private_key", &["string"]),
    f("io.jwt.decode", &["string"]),
    f("io.jwt.decode_verify", &["string", "object[string: any]"]),
    f("io.jwt.encode_sign", &["object[string: any]", "object[string: any]", "object[string: any]"]),
    f("io.jwt.encode_sign_raw", &["string", "string", "string"]),
    f("io.jwt.verify_es256", &["string", "string"]),
    f("io.jwt.verify_hs256", &["string", "string"]),
    f("io.jwt.verify_ps256", &["string", "string"]),
    f("io.jwt.verify_rs256", &["string", "string"]),
    // Networking
    f("http.send", &["object[string: any]"]),
    f("net.cidr_contains", &["string", "string"]),
    f("net.cidr_contains_matches", &["any<string, array[any<string, array[any]>], object[string: any<string, array[any]>], set[any<string, array[any]>]>", "any<string, array[any<string, array[any]>], object[string: any<string, array[any]>], set[any<string, array[any]>]>"]),
    f("net.cidr_expand", &["string"]),
    f("net.cidr_intersects", &["string", "string"]),
    f("net.cidr_is_valid", &["string"]),
    f("net.cidr_merge", &["any<array[any<string>], set[string]>"]),
    f("net.lookup_ip_addr", &["string"]),
    f("uuid.parse", &["string"]),
    f("uuid.rfc4122", &["string"]),
    f("units.parse", &["string"]),
    f("units.parse_bytes", &["string"]),
    f("semver.compare", &["string", "string"]),
    f("semver.is_valid", &["any"]),
    // Graphs and misc
    f("graph.reachable", &["object[any: any<array[any], set[any]>]", "any<array[any], set[any]>"]),
    f("graph.reachable_paths", &["object[any: any<array[any], set[any]>]", "any<array[any], set[any]>"]),
    f("walk", &["any"]),
    f("opa.runtime", &[]),
    f("print", &["any"]),
    f("trace", &["string"]),
    f("rego.metadata.chain", &[]),
    f("rego.metadata.rule", &[]),
    f("rego.parse_module", &["string", "string"]),
    f("cast_array", &["any"]),
    f("cast_set", &["any"]),
    f("set", &[]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_joins_parameter_types() {
        let sprintf = lookup("sprintf").unwrap();
        assert_eq!(sprintf.signature(), "sprintf(string, array[any])");
    }

    #[test]
    fn namespaces_are_prefixes_of_dotted_names() {
        assert!(is_namespace("json"));
        assert!(is_namespace("crypto"));
        assert!(!is_namespace("sprintf"));
        assert!(!is_namespace("jso"));
    }

    #[test]
    fn callable_skips_operators() {
        assert!(callable().all(|b| !b.infix));
        assert!(callable().all(|b| b.name != "plus"));
    }
}
