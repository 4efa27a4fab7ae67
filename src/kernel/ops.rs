//! Built-in kernel implementations and their symbolic printers.
//!
//! Arithmetic kernels fold over all their arguments (`diff` and `div`
//! fold left from the first). `sin`, `cos`, `log`, `exp` are unary and
//! apply to the first argument when handed more. Activations (`sig`,
//! `tanh`, `ReLu`, `ELU`, `ISRU`) sum their arguments to a
//! pre-activation first, which is also how the ANN expression applies
//! them to its weighted, biased sums.
//!
//! Printer simplifications (`x+0 → x`, `x*0 → 0`, `x/x → 1`, ...) are
//! cosmetic only and never feed back into numeric evaluation.

use crate::kernel::Kernel;
use crate::scalar::Scalar;

/// Look a kernel up in the built-in registry.
pub(crate) fn lookup<T: Scalar>(name: &str) -> Option<Kernel<T>> {
    let (fun, printer): (fn(&[T]) -> T, fn(&[String]) -> String) = match name {
        "sum" => (k_sum, print_sum),
        "diff" => (k_diff, print_diff),
        "mul" => (k_mul, print_mul),
        "div" => (k_div, print_div),
        "sig" => (k_sig, print_sig),
        "tanh" => (k_tanh, print_tanh),
        "ReLu" => (k_relu, print_relu),
        "ELU" => (k_elu, print_elu),
        "ISRU" => (k_isru, print_isru),
        "sin" => (k_sin, print_sin),
        "cos" => (k_cos, print_cos),
        "log" => (k_log, print_log),
        "exp" => (k_exp, print_exp),
        _ => return None,
    };
    Some(Kernel::new(name, fun, printer))
}

fn pre_activation<T: Scalar>(args: &[T]) -> T {
    args.iter().copied().fold(T::from_f64(0.0), |acc, x| acc + x)
}

fn k_sum<T: Scalar>(args: &[T]) -> T {
    pre_activation(args)
}

fn k_diff<T: Scalar>(args: &[T]) -> T {
    args[1..].iter().copied().fold(args[0], |acc, x| acc - x)
}

fn k_mul<T: Scalar>(args: &[T]) -> T {
    args[1..].iter().copied().fold(args[0], |acc, x| acc * x)
}

fn k_div<T: Scalar>(args: &[T]) -> T {
    args[1..].iter().copied().fold(args[0], |acc, x| acc / x)
}

fn k_sig<T: Scalar>(args: &[T]) -> T {
    let s = pre_activation(args);
    T::from_f64(1.0) / (T::from_f64(1.0) + (-s).exp())
}

fn k_tanh<T: Scalar>(args: &[T]) -> T {
    pre_activation(args).tanh()
}

fn k_relu<T: Scalar>(args: &[T]) -> T {
    let s = pre_activation(args);
    if s.primal() > 0.0 {
        s
    } else {
        T::from_f64(0.0)
    }
}

fn k_elu<T: Scalar>(args: &[T]) -> T {
    let s = pre_activation(args);
    if s.primal() > 0.0 {
        s
    } else {
        s.exp() - T::from_f64(1.0)
    }
}

fn k_isru<T: Scalar>(args: &[T]) -> T {
    let s = pre_activation(args);
    s / (T::from_f64(1.0) + s * s).sqrt()
}

fn k_sin<T: Scalar>(args: &[T]) -> T {
    args[0].sin()
}

fn k_cos<T: Scalar>(args: &[T]) -> T {
    args[0].cos()
}

fn k_log<T: Scalar>(args: &[T]) -> T {
    args[0].ln()
}

fn k_exp<T: Scalar>(args: &[T]) -> T {
    args[0].exp()
}

fn print_sum(args: &[String]) -> String {
    // Drop zero terms, collapse repeats of a single term to (k*term).
    let terms: Vec<&String> = args.iter().filter(|s| s.as_str() != "0").collect();
    if terms.is_empty() {
        return "0".to_string();
    }
    if terms.len() == 1 {
        return terms[0].clone();
    }
    if terms.iter().all(|s| *s == terms[0]) {
        return format!("({}*{})", terms.len(), terms[0]);
    }
    let joined = terms
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("+");
    format!("({joined})")
}

fn print_diff(args: &[String]) -> String {
    let head = &args[0];
    let tail: Vec<&String> = args[1..].iter().filter(|s| s.as_str() != "0").collect();
    if tail.is_empty() {
        return head.clone();
    }
    if tail.len() == 1 && head == tail[0] {
        return "0".to_string();
    }
    let rest = tail
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("-");
    if head == "0" {
        return format!("(-{rest})");
    }
    format!("({head}-{rest})")
}

fn print_mul(args: &[String]) -> String {
    if args.iter().any(|s| s == "0") {
        return "0".to_string();
    }
    let factors: Vec<&String> = args.iter().filter(|s| s.as_str() != "1").collect();
    if factors.is_empty() {
        return "1".to_string();
    }
    if factors.len() == 1 {
        return factors[0].clone();
    }
    if factors.len() == 2 && factors[0] == factors[1] {
        return format!("{}^2", factors[0]);
    }
    let joined = factors
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("*");
    format!("({joined})")
}

fn print_div(args: &[String]) -> String {
    if args.len() == 2 {
        if args[0] == args[1] {
            return "1".to_string();
        }
        if args[0] == "0" && args[1] != "0" {
            return "0".to_string();
        }
    }
    let joined = args
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("/");
    format!("({joined})")
}

fn print_activation(name: &str, args: &[String]) -> String {
    format!("{name}({})", print_sum(args))
}

fn print_sig(args: &[String]) -> String {
    print_activation("sig", args)
}

fn print_tanh(args: &[String]) -> String {
    print_activation("tanh", args)
}

fn print_relu(args: &[String]) -> String {
    print_activation("ReLu", args)
}

fn print_elu(args: &[String]) -> String {
    print_activation("ELU", args)
}

fn print_isru(args: &[String]) -> String {
    print_activation("ISRU", args)
}

fn print_sin(args: &[String]) -> String {
    format!("sin({})", args[0])
}

fn print_cos(args: &[String]) -> String {
    format!("cos({})", args[0])
}

fn print_log(args: &[String]) -> String {
    format!("log({})", args[0])
}

fn print_exp(args: &[String]) -> String {
    format!("exp({})", args[0])
}
