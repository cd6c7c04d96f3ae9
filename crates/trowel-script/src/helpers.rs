//! Runtime helpers for lowered syntax.
//!
//! Lowering some features (async functions, object spread, private fields)
//! emits calls such as `babelHelpers.asyncToGenerator(...)`. Bundles are
//! classic scripts with no module loader, so the helpers are defined once at
//! the top of the bundle instead of being imported.

use std::collections::BTreeSet;

/// Global object the lowered code reads helpers from.
pub const HELPER_OBJECT: &str = "babelHelpers";

/// Helpers defined by [`HELPER_PREAMBLE`].
pub const SUPPORTED_HELPERS: &[&str] = &[
    "asyncToGenerator",
    "assertClassBrand",
    "checkInRHS",
    "classPrivateFieldGet2",
    "classPrivateFieldInitSpec",
    "classPrivateFieldSet2",
    "classPrivateMethodInitSpec",
    "defineProperty",
    "extends",
    "objectDestructuringEmpty",
    "objectSpread2",
    "objectWithoutProperties",
    "readOnlyError",
    "toPropertyKey",
    "toSetter",
    "writeOnlyError",
];

/// Defines every supported helper on the global `babelHelpers` object.
pub const HELPER_PREAMBLE: &str = r#"var babelHelpers = (function (h) {
  function asyncGeneratorStep(g, resolve, reject, next, raise, key, arg) {
    try {
      var info = g[key](arg), value = info.value;
    } catch (error) {
      reject(error);
      return;
    }
    info.done ? resolve(value) : Promise.resolve(value).then(next, raise);
  }
  h.asyncToGenerator = function (fn) {
    return function () {
      var self = this, args = arguments;
      return new Promise(function (resolve, reject) {
        var g = fn.apply(self, args);
        function next(value) { asyncGeneratorStep(g, resolve, reject, next, raise, "next", value); }
        function raise(error) { asyncGeneratorStep(g, resolve, reject, next, raise, "throw", error); }
        next(void 0);
      });
    };
  };
  function toPrimitive(input, hint) {
    if (typeof input !== "object" || !input) return input;
    var prim = input[Symbol.toPrimitive];
    if (prim !== void 0) {
      var res = prim.call(input, hint || "default");
      if (typeof res !== "object") return res;
      throw new TypeError("@@toPrimitive must return a primitive value.");
    }
    return (hint === "string" ? String : Number)(input);
  }
  h.toPropertyKey = function (arg) {
    var key = toPrimitive(arg, "string");
    return typeof key === "symbol" ? key : key + "";
  };
  h.defineProperty = function (obj, key, value) {
    key = h.toPropertyKey(key);
    if (key in obj) {
      Object.defineProperty(obj, key, { value: value, enumerable: true, configurable: true, writable: true });
    } else {
      obj[key] = value;
    }
    return obj;
  };
  function ownKeys(object, enumerableOnly) {
    var keys = Object.keys(object);
    if (Object.getOwnPropertySymbols) {
      var symbols = Object.getOwnPropertySymbols(object);
      if (enumerableOnly) {
        symbols = symbols.filter(function (sym) {
          return Object.getOwnPropertyDescriptor(object, sym).enumerable;
        });
      }
      keys.push.apply(keys, symbols);
    }
    return keys;
  }
  h.objectSpread2 = function (target) {
    for (var i = 1; i < arguments.length; i++) {
      var source = arguments[i] != null ? arguments[i] : {};
      if (i % 2) {
        ownKeys(Object(source), true).forEach(function (key) {
          h.defineProperty(target, key, source[key]);
        });
      } else if (Object.getOwnPropertyDescriptors) {
        Object.defineProperties(target, Object.getOwnPropertyDescriptors(source));
      } else {
        ownKeys(Object(source)).forEach(function (key) {
          Object.defineProperty(target, key, Object.getOwnPropertyDescriptor(source, key));
        });
      }
    }
    return target;
  };
  h.extends = Object.assign || function (target) {
    for (var i = 1; i < arguments.length; i++) {
      var source = arguments[i];
      for (var key in source) {
        if (Object.prototype.hasOwnProperty.call(source, key)) target[key] = source[key];
      }
    }
    return target;
  };
  h.objectDestructuringEmpty = function (obj) {
    if (obj == null) throw new TypeError("Cannot destructure " + obj);
  };
  h.objectWithoutProperties = function (source, excluded) {
    if (source == null) return {};
    var target = {}, key, i;
    for (key in source) {
      if (Object.prototype.hasOwnProperty.call(source, key) && excluded.indexOf(key) < 0) {
        target[key] = source[key];
      }
    }
    if (Object.getOwnPropertySymbols) {
      var symbols = Object.getOwnPropertySymbols(source);
      for (i = 0; i < symbols.length; i++) {
        key = symbols[i];
        if (excluded.indexOf(key) < 0 && Object.prototype.propertyIsEnumerable.call(source, key)) {
          target[key] = source[key];
        }
      }
    }
    return target;
  };
  function checkPrivateRedeclaration(obj, privateCollection) {
    if (privateCollection.has(obj)) {
      throw new TypeError("Cannot initialize the same private elements twice on an object");
    }
  }
  h.classPrivateFieldInitSpec = function (obj, privateMap, value) {
    checkPrivateRedeclaration(obj, privateMap);
    privateMap.set(obj, value);
  };
  h.classPrivateMethodInitSpec = function (obj, privateSet) {
    checkPrivateRedeclaration(obj, privateSet);
    privateSet.add(obj);
  };
  h.assertClassBrand = function (brand, receiver, value) {
    if (typeof brand === "function" ? brand === receiver : brand.has(receiver)) {
      return arguments.length < 3 ? receiver : value;
    }
    throw new TypeError("Private element is not present on this object");
  };
  h.classPrivateFieldGet2 = function (privateMap, receiver) {
    return privateMap.get(h.assertClassBrand(privateMap, receiver));
  };
  h.classPrivateFieldSet2 = function (privateMap, receiver, value) {
    privateMap.set(h.assertClassBrand(privateMap, receiver), value);
    return value;
  };
  h.checkInRHS = function (value) {
    if (Object(value) !== value) {
      throw new TypeError("right-hand side of 'in' should be an object, got " + (value !== null ? typeof value : "null"));
    }
    return value;
  };
  h.toSetter = function (fn, args, thisArg) {
    args || (args = []);
    var index = args.length++;
    return Object.defineProperty({}, "_", {
      set: function (value) {
        args[index] = value;
        fn.apply(thisArg, args);
      }
    });
  };
  h.readOnlyError = function (name) {
    throw new TypeError('"' + name + '" is read-only');
  };
  h.writeOnlyError = function (name) {
    throw new TypeError('"' + name + '" is write-only');
  };
  return h;
})(typeof babelHelpers === "object" && babelHelpers ? babelHelpers : {});
"#;

/// Names of the helpers `code` reads from the helper object.
pub fn helpers_used(code: &str) -> BTreeSet<String> {
    let prefix = format!("{HELPER_OBJECT}.");
    let mut used = BTreeSet::new();

    for (pos, _) in code.match_indices(&prefix) {
        let preceded_by_ident = code[..pos]
            .chars()
            .next_back()
            .is_some_and(is_ident_char);
        if preceded_by_ident {
            continue;
        }

        let rest = &code[pos + prefix.len()..];
        let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        if end > 0 {
            used.insert(rest[..end].to_string());
        }
    }

    used
}

/// Whether [`HELPER_PREAMBLE`] defines `helper`.
pub fn is_supported(helper: &str) -> bool {
    SUPPORTED_HELPERS.contains(&helper)
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_helper_calls() {
        let code = "var o = babelHelpers.objectSpread2({}, a);\n\
                    var f = babelHelpers.asyncToGenerator(function* () {});\n\
                    mybabelHelpers.extends(o);\n";

        let used = helpers_used(code);

        assert_eq!(
            used.into_iter().collect::<Vec<_>>(),
            vec!["asyncToGenerator", "objectSpread2"]
        );
    }

    #[test]
    fn preamble_defines_every_supported_helper() {
        for helper in SUPPORTED_HELPERS {
            assert!(
                HELPER_PREAMBLE.contains(&format!("h.{helper} = ")),
                "{helper} is not defined"
            );
        }
        assert!(!HELPER_PREAMBLE.contains("require("));
        assert!(HELPER_PREAMBLE.ends_with('\n'));
    }

    #[test]
    fn unknown_helpers_are_unsupported() {
        assert!(is_supported("objectSpread2"));
        assert!(!is_supported("usingCtx"));
    }
}
