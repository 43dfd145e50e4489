//! Concurrent compilation must match sequential results

use std::ffi::{CStr, CString};
use std::thread;

use xtql_parser::compile_to_string;
use xtql_parser::ffi::{xtql_compile_to_json, xtql_release_output};

fn queries() -> Vec<String> {
    (0..32)
        .map(|i| match i % 4 {
            0 => format!("(from :table_{} [col_{} {{:xt/id id}}])", i, i),
            1 => format!("(-> (from :t [a]) (where (> a {})) (limit {}))", i, i + 1),
            2 => format!("(unify (from :a [x]) (join (from :b [{{:x x}} y_{}]) [y_{}]))", i, i),
            _ => format!("(rel [{{:n {} :s \"row {}\"}}] [n s])", i, i),
        })
        .collect()
}

#[test]
fn test_threads_match_sequential() {
    let queries = queries();
    let expected: Vec<String> = queries.iter().map(|q| compile_to_string(q).unwrap()).collect();

    thread::scope(|s| {
        let handles: Vec<_> = queries
            .iter()
            .zip(&expected)
            .map(|(query, want)| {
                s.spawn(move || {
                    for _ in 0..200 {
                        assert_eq!(&compile_to_string(query).unwrap(), want);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    });
}

#[test]
fn test_threads_through_ffi() {
    let queries = queries();
    let expected: Vec<String> = queries.iter().map(|q| compile_to_string(q).unwrap()).collect();

    thread::scope(|s| {
        for (query, want) in queries.iter().zip(&expected) {
            s.spawn(move || {
                let c_query = CString::new(query.as_str()).unwrap();
                for _ in 0..100 {
                    let out = xtql_compile_to_json(c_query.as_ptr());
                    assert!(!out.is_null());
                    let got = unsafe { CStr::from_ptr(out) }.to_str().unwrap().to_owned();
                    xtql_release_output(out);
                    assert_eq!(&got, want);
                }
            });
        }
    });
}

#[test]
fn test_errors_are_independent() {
    thread::scope(|s| {
        for i in 0..16 {
            s.spawn(move || {
                let query = if i % 2 == 0 {
                    format!("(from :t [a_{}])", i)
                } else {
                    format!("(from :t [a_{}]", i)
                };
                let result = compile_to_string(&query);
                assert_eq!(result.is_ok(), i % 2 == 0, "query {}", query);
            });
        }
    });
}
