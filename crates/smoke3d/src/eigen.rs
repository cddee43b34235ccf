//! Eigenvalues of 3x3 matrices.
//!
//! Symmetric matrices go through Householder tridiagonalization followed by
//! the implicit QL algorithm (tred2 / tql2). Everything else is reduced to
//! upper Hessenberg form (orthes) and solved with the shifted double QR
//! iteration (hqr), which is capped at [`EIGEN_MAX_ITERATIONS`].

use crate::constants::EIGEN_MAX_ITERATIONS;
use crate::lu::Mat3;

const N: usize = 3;
const EPS: f64 = f64::EPSILON;

/// Eigenvalues as real and imaginary parts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Eigenvalues {
    pub real: [f64; 3],
    pub imag: [f64; 3],
    /// False when the QR iteration hit its cap; the values are then partial.
    pub converged: bool,
}

impl Eigenvalues {
    /// `|lambda_i|` for each eigenvalue.
    pub fn magnitudes(&self) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (i, m) in out.iter_mut().enumerate() {
            *m = self.real[i].hypot(self.imag[i]);
        }
        out
    }
}

/// Exact symmetry test.
pub fn is_symmetric(a: &Mat3) -> bool {
    (0..N).all(|i| (0..i).all(|j| a[i][j] == a[j][i]))
}

/// Eigenvalues of `a`, using the symmetric path when `a` is exactly
/// symmetric.
pub fn eigenvalues(a: &Mat3) -> Eigenvalues {
    if is_symmetric(a) {
        let (d, _) = symmetric_eigen(a);
        Eigenvalues {
            real: d,
            imag: [0.0; 3],
            converged: true,
        }
    } else {
        general_eigenvalues(a)
    }
}

// ========== Symmetric path ==========

/// Eigenvalues (ascending) and eigenvectors (columns of the returned matrix)
/// of a symmetric matrix.
pub fn symmetric_eigen(a: &Mat3) -> ([f64; 3], Mat3) {
    let mut v = *a;
    let mut d = [0.0; N];
    let mut e = [0.0; N];
    tred2(&mut v, &mut d, &mut e);
    tql2(&mut v, &mut d, &mut e);
    (d, v)
}

/// Householder reduction to tridiagonal form.
fn tred2(v: &mut Mat3, d: &mut [f64; N], e: &mut [f64; N]) {
    d.copy_from_slice(&v[N - 1]);

    for i in (1..N).rev() {
        let mut scale = 0.0;
        let mut h = 0.0;
        for k in 0..i {
            scale += d[k].abs();
        }
        if scale == 0.0 {
            e[i] = d[i - 1];
            for j in 0..i {
                d[j] = v[i - 1][j];
                v[i][j] = 0.0;
                v[j][i] = 0.0;
            }
        } else {
            for k in 0..i {
                d[k] /= scale;
                h += d[k] * d[k];
            }
            let mut f = d[i - 1];
            let mut g = h.sqrt();
            if f > 0.0 {
                g = -g;
            }
            e[i] = scale * g;
            h -= f * g;
            d[i - 1] = f - g;
            for ej in e.iter_mut().take(i) {
                *ej = 0.0;
            }

            for j in 0..i {
                f = d[j];
                v[j][i] = f;
                g = e[j] + v[j][j] * f;
                for k in j + 1..i {
                    g += v[k][j] * d[k];
                    e[k] += v[k][j] * f;
                }
                e[j] = g;
            }
            f = 0.0;
            for j in 0..i {
                e[j] /= h;
                f += e[j] * d[j];
            }
            let hh = f / (h + h);
            for j in 0..i {
                e[j] -= hh * d[j];
            }
            for j in 0..i {
                f = d[j];
                g = e[j];
                for k in j..i {
                    v[k][j] -= f * e[k] + g * d[k];
                }
                d[j] = v[i - 1][j];
                v[i][j] = 0.0;
            }
        }
        d[i] = h;
    }

    // accumulate transformations
    for i in 0..N - 1 {
        v[N - 1][i] = v[i][i];
        v[i][i] = 1.0;
        let h = d[i + 1];
        if h != 0.0 {
            for k in 0..=i {
                d[k] = v[k][i + 1] / h;
            }
            for j in 0..=i {
                let mut g = 0.0;
                for k in 0..=i {
                    g += v[k][i + 1] * v[k][j];
                }
                for k in 0..=i {
                    v[k][j] -= g * d[k];
                }
            }
        }
        for k in 0..=i {
            v[k][i + 1] = 0.0;
        }
    }
    for j in 0..N {
        d[j] = v[N - 1][j];
        v[N - 1][j] = 0.0;
    }
    v[N - 1][N - 1] = 1.0;
    e[0] = 0.0;
}

/// Implicit QL on the tridiagonal form, then sort ascending.
fn tql2(v: &mut Mat3, d: &mut [f64; N], e: &mut [f64; N]) {
    for i in 1..N {
        e[i - 1] = e[i];
    }
    e[N - 1] = 0.0;

    let mut f = 0.0;
    let mut tst1: f64 = 0.0;
    for l in 0..N {
        tst1 = tst1.max(d[l].abs() + e[l].abs());
        let mut m = l;
        while m < N - 1 && e[m].abs() > EPS * tst1 {
            m += 1;
        }

        if m > l {
            loop {
                let mut g = d[l];
                let mut p = (d[l + 1] - g) / (2.0 * e[l]);
                let mut r = p.hypot(1.0);
                if p < 0.0 {
                    r = -r;
                }
                d[l] = e[l] / (p + r);
                d[l + 1] = e[l] * (p + r);
                let dl1 = d[l + 1];
                let mut h = g - d[l];
                for di in d.iter_mut().skip(l + 2) {
                    *di -= h;
                }
                f += h;

                p = d[m];
                let mut c = 1.0;
                let mut c2 = c;
                let mut c3 = c;
                let el1 = e[l + 1];
                let mut s = 0.0;
                let mut s2 = 0.0;
                for i in (l..m).rev() {
                    c3 = c2;
                    c2 = c;
                    s2 = s;
                    g = c * e[i];
                    h = c * p;
                    r = p.hypot(e[i]);
                    e[i + 1] = s * r;
                    s = e[i] / r;
                    c = p / r;
                    p = c * d[i] - s * g;
                    d[i + 1] = h + s * (c * g + s * d[i]);
                    for row in v.iter_mut() {
                        h = row[i + 1];
                        row[i + 1] = s * row[i] + c * h;
                        row[i] = c * row[i] - s * h;
                    }
                }
                p = -s * s2 * c3 * el1 * e[l] / dl1;
                e[l] = s * p;
                d[l] = c * p;

                if !(e[l].abs() > EPS * tst1) {
                    break;
                }
            }
        }
        d[l] += f;
        e[l] = 0.0;
    }

    // selection sort, columns of v follow
    for i in 0..N - 1 {
        let mut k = i;
        let mut p = d[i];
        for (j, &dj) in d.iter().enumerate().skip(i + 1) {
            if dj < p {
                k = j;
                p = dj;
            }
        }
        if k != i {
            d[k] = d[i];
            d[i] = p;
            for row in v.iter_mut() {
                row.swap(i, k);
            }
        }
    }
}

// ========== General path ==========

/// Eigenvalues of a general real matrix.
pub fn general_eigenvalues(a: &Mat3) -> Eigenvalues {
    let mut h = *a;
    orthes(&mut h);
    hqr(&mut h)
}

/// Householder reduction to upper Hessenberg form.
fn orthes(h: &mut Mat3) {
    let high = N - 1;
    let mut ort = [0.0; N];

    for m in 1..high {
        let mut scale = 0.0;
        for row in h.iter().take(high + 1).skip(m) {
            scale += row[m - 1].abs();
        }
        if scale == 0.0 {
            continue;
        }

        let mut hsum = 0.0;
        for i in (m..=high).rev() {
            ort[i] = h[i][m - 1] / scale;
            hsum += ort[i] * ort[i];
        }
        let mut g = hsum.sqrt();
        if ort[m] > 0.0 {
            g = -g;
        }
        hsum -= ort[m] * g;
        ort[m] -= g;

        for j in m..N {
            let mut f = 0.0;
            for i in (m..=high).rev() {
                f += ort[i] * h[i][j];
            }
            f /= hsum;
            for i in m..=high {
                h[i][j] -= f * ort[i];
            }
        }
        for row in h.iter_mut().take(high + 1) {
            let mut f = 0.0;
            for j in (m..=high).rev() {
                f += ort[j] * row[j];
            }
            f /= hsum;
            for j in m..=high {
                row[j] -= f * ort[j];
            }
        }
        ort[m] *= scale;
        h[m][m - 1] = scale * g;
    }
}

/// Shifted double QR on an upper Hessenberg matrix, eigenvalues only.
fn hqr(hm: &mut Mat3) -> Eigenvalues {
    macro_rules! h {
        ($i:expr, $j:expr) => {
            hm[($i) as usize][($j) as usize]
        };
    }

    let nn = N as isize;
    let low: isize = 0;
    let mut n = nn - 1;
    let mut d = [0.0; N];
    let mut e = [0.0; N];
    let mut exshift = 0.0;
    let (mut p, mut q, mut r, mut s, mut z) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
    let (mut w, mut x, mut y) = (0.0f64, 0.0f64, 0.0f64);

    let mut norm = 0.0;
    for i in 0..nn {
        for j in (i - 1).max(0)..nn {
            norm += h!(i, j).abs();
        }
    }

    let mut iter = 0;
    let mut total = 0;
    while n >= low {
        // look for a single small sub-diagonal element
        let mut l = n;
        while l > low {
            s = h!(l - 1, l - 1).abs() + h!(l, l).abs();
            if s == 0.0 {
                s = norm;
            }
            if h!(l, l - 1).abs() < EPS * s {
                break;
            }
            l -= 1;
        }

        if l == n {
            // one root
            h!(n, n) += exshift;
            d[n as usize] = h!(n, n);
            e[n as usize] = 0.0;
            n -= 1;
            iter = 0;
        } else if l == n - 1 {
            // two roots
            w = h!(n, n - 1) * h!(n - 1, n);
            p = (h!(n - 1, n - 1) - h!(n, n)) / 2.0;
            q = p * p + w;
            z = q.abs().sqrt();
            h!(n, n) += exshift;
            h!(n - 1, n - 1) += exshift;
            x = h!(n, n);

            let (a, b) = ((n - 1) as usize, n as usize);
            if q >= 0.0 {
                z = if p >= 0.0 { p + z } else { p - z };
                d[a] = x + z;
                d[b] = d[a];
                if z != 0.0 {
                    d[b] = x - w / z;
                }
                e[a] = 0.0;
                e[b] = 0.0;
            } else {
                d[a] = x + p;
                d[b] = x + p;
                e[a] = z;
                e[b] = -z;
            }
            n -= 2;
            iter = 0;
        } else {
            total += 1;
            if total > EIGEN_MAX_ITERATIONS {
                return Eigenvalues {
                    real: d,
                    imag: e,
                    converged: false,
                };
            }

            x = h!(n, n);
            y = 0.0;
            w = 0.0;
            if l < n {
                y = h!(n - 1, n - 1);
                w = h!(n, n - 1) * h!(n - 1, n);
            }

            // Wilkinson's ad hoc shift
            if iter == 10 {
                exshift += x;
                for i in low..=n {
                    h!(i, i) -= x;
                }
                s = h!(n, n - 1).abs() + h!(n - 1, n - 2).abs();
                x = 0.75 * s;
                y = x;
                w = -0.4375 * s * s;
            }

            // exceptional shift
            if iter == 30 {
                s = (y - x) / 2.0;
                s = s * s + w;
                if s > 0.0 {
                    s = s.sqrt();
                    if y < x {
                        s = -s;
                    }
                    s = x - w / ((y - x) / 2.0 + s);
                    for i in low..=n {
                        h!(i, i) -= s;
                    }
                    exshift += s;
                    x = 0.964;
                    y = x;
                    w = x;
                }
            }

            iter += 1;

            // look for two consecutive small sub-diagonal elements
            let mut m = n - 2;
            while m >= l {
                z = h!(m, m);
                r = x - z;
                s = y - z;
                p = (r * s - w) / h!(m + 1, m) + h!(m, m + 1);
                q = h!(m + 1, m + 1) - z - r - s;
                r = h!(m + 2, m + 1);
                s = p.abs() + q.abs() + r.abs();
                p /= s;
                q /= s;
                r /= s;
                if m == l {
                    break;
                }
                if h!(m, m - 1).abs() * (q.abs() + r.abs())
                    < EPS * (p.abs() * (h!(m - 1, m - 1).abs() + z.abs() + h!(m + 1, m + 1).abs()))
                {
                    break;
                }
                m -= 1;
            }

            for i in m + 2..=n {
                h!(i, i - 2) = 0.0;
                if i > m + 2 {
                    h!(i, i - 3) = 0.0;
                }
            }

            // double QR step on rows l..=n and columns m..=n
            let mut k = m;
            while k <= n - 1 {
                let notlast = k != n - 1;
                let mut skip = false;
                if k != m {
                    p = h!(k, k - 1);
                    q = h!(k + 1, k - 1);
                    r = if notlast { h!(k + 2, k - 1) } else { 0.0 };
                    x = p.abs() + q.abs() + r.abs();
                    if x == 0.0 {
                        skip = true;
                    } else {
                        p /= x;
                        q /= x;
                        r /= x;
                    }
                }
                if !skip {
                    s = (p * p + q * q + r * r).sqrt();
                    if p < 0.0 {
                        s = -s;
                    }
                    if s != 0.0 {
                        if k != m {
                            h!(k, k - 1) = -s * x;
                        } else if l != m {
                            h!(k, k - 1) = -h!(k, k - 1);
                        }
                        p += s;
                        x = p / s;
                        y = q / s;
                        z = r / s;
                        q /= p;
                        r /= p;

                        // row modification
                        for j in k..nn {
                            p = h!(k, j) + q * h!(k + 1, j);
                            if notlast {
                                p += r * h!(k + 2, j);
                                h!(k + 2, j) -= p * z;
                            }
                            h!(k, j) -= p * x;
                            h!(k + 1, j) -= p * y;
                        }

                        // column modification
                        for i in 0..=n.min(k + 3) {
                            p = x * h!(i, k) + y * h!(i, k + 1);
                            if notlast {
                                p += z * h!(i, k + 2);
                                h!(i, k + 2) -= p * r;
                            }
                            h!(i, k) -= p;
                            h!(i, k + 1) -= p * q;
                        }
                    }
                }
                k += 1;
            }
        }
    }

    Eigenvalues {
        real: d,
        imag: e,
        converged: true,
    }
}
